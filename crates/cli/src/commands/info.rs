//! `info` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use contracts::{RunConfig, StepInvocation, StepSelection};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    project_name: &'a str,
    experiment_name: &'a str,
    tracking_root: String,
    steps: &'a [StepInvocation],
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config, &[], args.steps.as_deref())?;
    let selection = StepSelection::parse(&config.main.steps).map_err(CliError::from)?;
    let invocations = orchestrator::plan::plan(&config, &selection, Path::new("<workspace>"))
        .map_err(CliError::from)?;

    if args.json {
        let info = ConfigInfo {
            project_name: &config.main.project_name,
            experiment_name: &config.main.experiment_name,
            tracking_root: config.tracking.root.display().to_string(),
            steps: &invocations,
        };
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_plan(&config, &invocations);
    }

    Ok(())
}

/// Print the derived steps of a run
pub(crate) fn print_plan(config: &RunConfig, invocations: &[StepInvocation]) {
    println!("\n=== Pipeline Plan ===\n");
    println!("Project: {}", config.main.project_name);
    println!("Run group: {}", config.main.experiment_name);
    println!("Tracking root: {}", config.tracking.root.display());

    println!("\nSteps ({}):", invocations.len());
    for (i, invocation) in invocations.iter().enumerate() {
        let is_last = i == invocations.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        let version = invocation
            .component
            .version
            .as_deref()
            .map(|v| format!(" @ {v}"))
            .unwrap_or_default();
        println!(
            "  {} {} ({}{})",
            prefix,
            invocation.step,
            invocation.component.location.display(),
            version
        );
        for (key, value) in invocation.params.iter() {
            println!("  {}    {} = {}", child_prefix, key, value);
        }
    }

    if !config.modeling.random_forest.is_empty() {
        println!("\nHyperparameters (written to rf_config.json):");
        for (key, value) in &config.modeling.random_forest {
            println!("  {} = {}", key, value);
        }
    }

    println!();
}
