//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ML Pipeline - step orchestrator and artifact-versioned data splitter
#[derive(Parser, Debug)]
#[command(
    name = "ml-pipeline",
    author,
    version,
    about = "Regression model pipeline orchestrator",
    long_about = "Runs the download / clean / check / split / train / test pipeline.\n\n\
                  Steps run in a fixed order inside one ephemeral workspace; every \n\
                  intermediate result is a versioned artifact in the tracking store."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ML_PIPELINE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "ML_PIPELINE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the selected pipeline steps
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display selected steps and their derived parameters
    Info(InfoArgs),

    /// Split an artifact into trainval / test and publish both
    Split(SplitArgs),

    /// Point an alias (e.g. prod) at an artifact version
    Promote(PromoteArgs),

    /// List versions and aliases of an artifact
    Artifacts(ArtifactsArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "ML_PIPELINE_CONFIG")]
    pub config: PathBuf,

    /// Steps to run (`all` or comma-separated), overrides main.steps
    #[arg(long)]
    pub steps: Option<String>,

    /// Configuration override, e.g. --set modeling.test_size=0.3
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Artifact store root, overrides tracking.root
    #[arg(long, env = "ML_PIPELINE_TRACKING_ROOT")]
    pub tracking_root: Option<PathBuf>,

    /// Parent directory for the run workspace (default: system temp dir)
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,

    /// Launch the split component as a process instead of splitting in-process
    #[arg(long)]
    pub external_split: bool,

    /// Print the derived steps and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "ML_PIPELINE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Steps to describe, overrides main.steps
    #[arg(long)]
    pub steps: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `split` command
///
/// Flag names match what the orchestrator passes to the split component.
#[derive(Parser, Debug)]
pub struct SplitArgs {
    /// Input artifact, version optional (defaults to latest)
    #[arg(long = "input_artifact")]
    pub input_artifact: String,

    /// Fraction held out as test
    #[arg(long = "test_size")]
    pub test_size: f64,

    /// Fraction of trainval used for validation by training
    #[arg(long = "val_size")]
    pub val_size: f64,

    /// Seed for the sampling routine
    #[arg(long = "random_seed")]
    pub random_seed: u64,

    /// Column to stratify on, or "null"
    #[arg(long = "stratify_by")]
    pub stratify_by: String,

    /// Project the artifacts belong to
    #[arg(long, env = "ML_PIPELINE_PROJECT", default_value = "default")]
    pub project: String,

    /// Artifact store root
    #[arg(long, env = "ML_PIPELINE_TRACKING_ROOT", default_value = ".artifacts")]
    pub tracking_root: PathBuf,

    /// Directory for partition files (default: a temporary directory)
    #[arg(long, env = "ML_PIPELINE_WORKSPACE")]
    pub workspace: Option<PathBuf>,
}

/// Arguments for the `promote` command
#[derive(Parser, Debug)]
pub struct PromoteArgs {
    /// Artifact reference, e.g. random_forest_export:v3
    #[arg(long)]
    pub artifact: String,

    /// Alias to move
    #[arg(long, default_value = "prod")]
    pub alias: String,

    /// Project the artifact belongs to
    #[arg(long, env = "ML_PIPELINE_PROJECT", default_value = "default")]
    pub project: String,

    /// Artifact store root
    #[arg(long, env = "ML_PIPELINE_TRACKING_ROOT", default_value = ".artifacts")]
    pub tracking_root: PathBuf,
}

/// Arguments for the `artifacts` command
#[derive(Parser, Debug)]
pub struct ArtifactsArgs {
    /// Artifact name
    #[arg(long)]
    pub name: String,

    /// Project the artifact belongs to
    #[arg(long, env = "ML_PIPELINE_PROJECT", default_value = "default")]
    pub project: String,

    /// Artifact store root
    #[arg(long, env = "ML_PIPELINE_TRACKING_ROOT", default_value = ".artifacts")]
    pub tracking_root: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
