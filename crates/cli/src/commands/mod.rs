//! Command implementations.

mod artifacts;
mod info;
mod promote;
mod run;
mod split;
mod validate;

pub use artifacts::run_artifacts;
pub use info::run_info;
pub use promote::run_promote;
pub use run::run_pipeline;
pub use split::run_split;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, Override, RunConfig};

use crate::error::CliError;

/// Load a config file, applying `--set` overrides and an optional step selection
pub(crate) fn load_config(
    path: &Path,
    raw_overrides: &[String],
    steps: Option<&str>,
) -> Result<RunConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path).into());
    }

    let mut overrides = raw_overrides
        .iter()
        .map(|raw| {
            raw.parse::<Override>()
                .map_err(|e| CliError::invalid_override(raw, e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(steps) = steps {
        overrides.push(
            Override::new("main.steps", serde_json::Value::String(steps.to_string()))
                .map_err(|e| CliError::invalid_override(steps, e))?,
        );
    }

    ConfigLoader::load_with_overrides(path, &overrides)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
