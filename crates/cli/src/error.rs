//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Malformed `--set` override
    #[error("Invalid override '{raw}': {source}")]
    InvalidOverride {
        raw: String,
        #[source]
        source: ContractError,
    },

    /// Pipeline or step failure, tagged with its error kind
    #[error("{kind}: {source}")]
    Pipeline {
        kind: &'static str,
        #[source]
        source: ContractError,
    },
}

impl CliError {
    pub fn config_not_found(path: &std::path::Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn invalid_override(raw: impl Into<String>, source: ContractError) -> Self {
        Self::InvalidOverride {
            raw: raw.into(),
            source,
        }
    }
}

impl From<ContractError> for CliError {
    fn from(source: ContractError) -> Self {
        Self::Pipeline {
            kind: source.kind(),
            source,
        }
    }
}
