//! `artifacts` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracking::{ArtifactManifest, LocalTracker};

use crate::cli::ArtifactsArgs;
use crate::error::CliError;

#[derive(Serialize)]
struct ArtifactListing {
    name: String,
    versions: Vec<ArtifactManifest>,
    aliases: Vec<(String, u32)>,
}

/// Execute the `artifacts` command
pub fn run_artifacts(args: &ArtifactsArgs) -> Result<()> {
    let tracker = LocalTracker::open(&args.tracking_root, &args.project)
        .map_err(CliError::from)
        .context("Failed to open artifact store")?;

    let listing = ArtifactListing {
        name: args.name.clone(),
        versions: tracker.list(&args.name).map_err(CliError::from)?,
        aliases: tracker.aliases(&args.name).map_err(CliError::from)?,
    };

    if args.json {
        let json = serde_json::to_string_pretty(&listing)
            .context("Failed to serialize artifact listing")?;
        println!("{}", json);
        return Ok(());
    }

    if listing.versions.is_empty() {
        println!("No versions of '{}'", listing.name);
        return Ok(());
    }

    println!("\n{} ({} versions)", listing.name, listing.versions.len());
    for manifest in &listing.versions {
        let aliases: Vec<&str> = listing
            .aliases
            .iter()
            .filter(|(_, v)| *v == manifest.version)
            .map(|(a, _)| a.as_str())
            .collect();
        println!(
            "  v{:<4} {:<12} {:>10} B  {}  {}{}",
            manifest.version,
            manifest.artifact_type,
            manifest.size_bytes,
            manifest.created_at.format("%Y-%m-%d %H:%M:%S"),
            manifest.description,
            if aliases.is_empty() {
                String::new()
            } else {
                format!("  [{}]", aliases.join(", "))
            }
        );
    }
    println!();
    Ok(())
}
