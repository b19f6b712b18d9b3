//! Layered error definitions
//!
//! Categorized by source: config / artifact / step / upload

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Artifact Errors =====
    /// Artifact reference could not be resolved upstream
    #[error("cannot resolve artifact '{reference}': {message}")]
    Resolution { reference: String, message: String },

    /// Stratify column missing from the resolved table
    #[error("column '{column}' not found in table (available: {available:?})")]
    InvalidColumn {
        column: String,
        available: Vec<String>,
    },

    // ===== Step Errors =====
    /// Wrapped failure from an invoked step
    #[error("step '{step}' failed: {message}")]
    StepExecution { step: String, message: String },

    // ===== Upload Errors =====
    /// Publish or durability wait failure
    #[error("upload of '{artifact}' failed: {message}")]
    Upload { artifact: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create artifact resolution error
    pub fn resolution(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create invalid column error
    pub fn invalid_column(column: impl Into<String>, available: &[String]) -> Self {
        Self::InvalidColumn {
            column: column.into(),
            available: available.to_vec(),
        }
    }

    /// Create step execution error
    pub fn step_execution(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepExecution {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Create upload error
    pub fn upload(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            artifact: artifact.into(),
            message: message.into(),
        }
    }

    /// Taxonomy name used in run status and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } => "ConfigurationError",
            Self::Resolution { .. } => "ResolutionError",
            Self::InvalidColumn { .. } => "InvalidColumnError",
            Self::StepExecution { .. } => "StepExecutionError",
            Self::Upload { .. } => "UploadError",
            Self::Io(_) | Self::Other(_) => "InternalError",
        }
    }

    /// True for errors raised before any step could run
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ConfigParse { .. } | Self::ConfigValidation { .. })
    }
}
