//! # Orchestrator
//!
//! Step selection, parameter derivation and sequential execution of the
//! pipeline inside one ephemeral workspace.
//!
//! ```ignore
//! use orchestrator::{Pipeline, PipelineConfig, ProcessRunner};
//!
//! let config = PipelineConfig::from_run_config(run_config)?;
//! let report = Pipeline::new(config, ProcessRunner::new()).run().await?;
//! ```

mod pipeline;
pub mod plan;
mod runner;

pub use pipeline::{Pipeline, PipelineConfig, RunReport, WORKSPACE_PREFIX};
pub use plan::{derive, write_rf_config, RF_CONFIG_FILE};
pub use runner::{
    NativeRunner, ProcessRunner, ENV_COMPONENT_VERSION, ENV_PROJECT, ENV_RUN_GROUP,
    ENV_TRACKING_ROOT, ENV_WORKSPACE,
};
