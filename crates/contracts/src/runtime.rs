//! Runtime step invocation types
//!
//! A step is a runnable unit: a component location, a parameter set and the
//! run context it executes in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ContractError, StepName};

/// Run-group identity and shared workspace, passed to every step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Project the run is logged under
    pub project_name: String,
    /// Run group shared by all steps of one run
    pub experiment_name: String,
    /// Ephemeral workspace private to this run
    pub workspace: PathBuf,
}

impl RunContext {
    pub fn new(
        project_name: impl Into<String>,
        experiment_name: impl Into<String>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            experiment_name: experiment_name.into(),
            workspace: workspace.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

/// Derived parameter set of one step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepParams(BTreeMap<String, Value>);

impl StepParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Required string parameter
    pub fn require_str(&self, key: &str) -> Result<&str, ContractError> {
        self.get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| missing_param(key, "string"))
    }

    /// Required float parameter
    pub fn require_f64(&self, key: &str) -> Result<f64, ContractError> {
        self.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing_param(key, "float"))
    }

    /// Required unsigned integer parameter
    pub fn require_u64(&self, key: &str) -> Result<u64, ContractError> {
        self.get(key)
            .and_then(Value::as_u64)
            .ok_or_else(|| missing_param(key, "integer"))
    }

    /// Render as `--key value` pairs, in key order
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.0.len() * 2);
        for (key, value) in &self.0 {
            args.push(format!("--{key}"));
            args.push(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
        args
    }
}

fn missing_param(key: &str, expected: &str) -> ContractError {
    ContractError::config_validation(
        format!("params.{key}"),
        format!("missing or non-{expected} parameter"),
    )
}

/// Where a step implementation lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRef {
    /// Directory of the component
    pub location: PathBuf,
    /// Entry point inside the component
    pub entry_point: String,
    /// Pinned component version, if any
    pub version: Option<String>,
}

impl ComponentRef {
    /// Component with the default `main` entry point
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            entry_point: "main".to_string(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Path of the entry point executable
    pub fn entry_path(&self) -> PathBuf {
        self.location.join(&self.entry_point)
    }
}

/// Fully derived invocation of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInvocation {
    pub step: StepName,
    pub component: ComponentRef,
    pub params: StepParams,
}

/// What a finished step reports back
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Artifacts published by the step, fully qualified
    pub published: Vec<String>,
}

impl StepOutcome {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Runnable unit invoked uniformly by the orchestrator
///
/// Implementations either run in-process or launch the component; the
/// orchestrator does not care which.
#[trait_variant::make(StepRunner: Send)]
pub trait LocalStepRunner {
    /// Run one step to completion
    ///
    /// # Errors
    /// Any failure; the orchestrator aborts the run without retrying.
    async fn run(
        &self,
        invocation: &StepInvocation,
        ctx: &RunContext,
    ) -> Result<StepOutcome, ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_in_key_order() {
        let params = StepParams::new()
            .with("test_size", 0.2)
            .with("input_artifact", "sample.csv")
            .with("random_seed", 42);
        assert_eq!(
            params.to_cli_args(),
            vec![
                "--input_artifact",
                "sample.csv",
                "--random_seed",
                "42",
                "--test_size",
                "0.2"
            ]
        );
    }

    #[test]
    fn test_require_accessors() {
        let params = StepParams::new()
            .with("stratify_by", "null")
            .with("val_size", 0.0)
            .with("random_seed", 7);
        assert_eq!(params.require_str("stratify_by").unwrap(), "null");
        assert_eq!(params.require_f64("val_size").unwrap(), 0.0);
        assert_eq!(params.require_u64("random_seed").unwrap(), 7);
        assert!(params.require_str("input_artifact").is_err());
        assert!(params.require_u64("stratify_by").is_err());
    }

    #[test]
    fn test_component_entry_path() {
        let c = ComponentRef::new("components/get_data").with_version("main");
        assert_eq!(c.entry_path(), PathBuf::from("components/get_data/main"));
        assert_eq!(c.version.as_deref(), Some("main"));
    }
}
