//! `split` command implementation.
//!
//! Standalone entry of the split step. Exit status is zero only after the
//! last partition is acknowledged durable.

use anyhow::{Context, Result};
use data_split::{DataSplitStep, SplitArgs as StepArgs, SplitOptions, Stratify};
use tracing::info;
use tracking::LocalTracker;

use crate::cli::SplitArgs;
use crate::error::CliError;

/// Execute the `split` command
pub async fn run_split(args: &SplitArgs) -> Result<()> {
    let stratify: Stratify = args.stratify_by.parse().map_err(CliError::from)?;
    let options = SplitOptions::new(args.test_size, args.val_size, args.random_seed, stratify)
        .map_err(CliError::from)?;
    let step_args = StepArgs::new(&args.input_artifact, options);

    let tracker = LocalTracker::open(&args.tracking_root, &args.project)
        .map_err(CliError::from)
        .context("Failed to open artifact store")?;

    // Keep the temporary workspace alive until the step returns.
    let temp;
    let workspace = match &args.workspace {
        Some(dir) => dir.as_path(),
        None => {
            temp = tempfile::Builder::new()
                .prefix("ml-pipeline-split-")
                .tempdir()
                .context("Failed to create workspace")?;
            temp.path()
        }
    };
    info!(workspace = %workspace.display(), "Split workspace ready");

    let report = DataSplitStep::new(&tracker)
        .run(&step_args, workspace)
        .await
        .map_err(CliError::from)
        .context("Split failed")?;

    for partition in &report.partitions {
        println!(
            "{}:v{}\t{} rows\t({} split of {})",
            partition.artifact, partition.version, partition.rows, partition.partition, report.input
        );
    }
    Ok(())
}
