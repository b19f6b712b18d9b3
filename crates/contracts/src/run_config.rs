//! RunConfig - Config Loader 输出
//!
//! One immutable parameter document per pipeline run: project identity,
//! step selection, ETL bounds, data-check thresholds and modeling settings.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sentinel value of `stratify_by` that disables stratification
pub const NO_STRATIFY: &str = "null";

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunConfig {
    /// Project identity and step selection
    #[validate(nested)]
    pub main: MainConfig,

    /// Sampling and price bounds
    #[validate(nested)]
    pub etl: EtlConfig,

    /// Statistical thresholds for the data check
    #[validate(nested)]
    pub data_check: DataCheckConfig,

    /// Split fractions and training hyperparameters
    #[validate(nested)]
    pub modeling: ModelingConfig,

    /// Artifact store location
    #[serde(default)]
    #[validate(nested)]
    pub tracking: TrackingConfig,
}

/// `[main]` section
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MainConfig {
    /// Project all runs are logged under
    #[validate(length(min = 1, message = "project_name cannot be empty"))]
    pub project_name: String,

    /// Run group shared by every step of this run
    #[validate(length(min = 1, message = "experiment_name cannot be empty"))]
    pub experiment_name: String,

    /// `all` or comma-separated step names
    #[serde(default = "default_steps")]
    pub steps: String,

    /// Location of independently versioned components
    #[validate(length(min = 1, message = "components_repository cannot be empty"))]
    pub components_repository: String,

    /// Location of project-local components
    #[serde(default = "default_local_components")]
    #[validate(length(min = 1, message = "local_components cannot be empty"))]
    pub local_components: String,
}

fn default_steps() -> String {
    crate::ALL_STEPS.to_string()
}

fn default_local_components() -> String {
    "src".to_string()
}

/// `[etl]` section
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EtlConfig {
    /// Raw sample file to download
    #[validate(length(min = 1, message = "sample cannot be empty"))]
    pub sample: String,

    /// Lower price bound
    pub min_price: f64,

    /// Upper price bound
    pub max_price: f64,
}

/// `[data_check]` section
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DataCheckConfig {
    /// KL divergence threshold against the reference sample
    #[validate(range(exclusive_min = 0.0, message = "kl_threshold must be > 0"))]
    pub kl_threshold: f64,
}

/// `[modeling]` section
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ModelingConfig {
    /// Fraction of rows held out as `test`
    #[validate(range(min = 0.0, exclusive_max = 1.0, message = "test_size must be in [0, 1)"))]
    pub test_size: f64,

    /// Fraction of `trainval` used for validation by the training step
    #[validate(range(min = 0.0, exclusive_max = 1.0, message = "val_size must be in [0, 1)"))]
    pub val_size: f64,

    /// Seed threaded through to every sampling routine
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    /// Column to stratify on, or `"null"`
    #[serde(default = "default_stratify_by")]
    #[validate(length(min = 1, message = "stratify_by cannot be empty, use \"null\""))]
    pub stratify_by: String,

    /// Name the training step exports the model under
    #[serde(default = "default_export_artifact")]
    #[validate(length(min = 1, message = "export_artifact cannot be empty"))]
    pub export_artifact: String,

    /// Open hyperparameter mapping, forwarded to training as a file
    #[serde(default)]
    pub random_forest: BTreeMap<String, serde_json::Value>,
}

fn default_random_seed() -> u64 {
    42
}

fn default_stratify_by() -> String {
    NO_STRATIFY.to_string()
}

fn default_export_artifact() -> String {
    "random_forest_export".to_string()
}

/// `[tracking]` section
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrackingConfig {
    /// Root directory of the local artifact store
    #[serde(default = "default_tracking_root")]
    pub root: PathBuf,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            root: default_tracking_root(),
        }
    }
}

fn default_tracking_root() -> PathBuf {
    PathBuf::from(".artifacts")
}
