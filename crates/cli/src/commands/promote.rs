//! `promote` command implementation.

use anyhow::{Context, Result};
use contracts::ArtifactRef;
use tracing::info;
use tracking::LocalTracker;

use crate::cli::PromoteArgs;
use crate::error::CliError;

/// Execute the `promote` command
pub fn run_promote(args: &PromoteArgs) -> Result<()> {
    let reference = ArtifactRef::parse(&args.artifact).map_err(CliError::from)?;
    let tracker = LocalTracker::open(&args.tracking_root, &args.project)
        .map_err(CliError::from)
        .context("Failed to open artifact store")?;

    let handle = tracker
        .promote(&reference, &args.alias)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to promote {}", args.artifact))?;

    info!(artifact = %handle.name, version = handle.version, alias = %args.alias, "Alias moved");
    println!("{}:{} -> v{}", handle.name, args.alias, handle.version);
    Ok(())
}
