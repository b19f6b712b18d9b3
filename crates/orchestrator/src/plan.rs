//! Step derivation
//!
//! Maps the run configuration to one `StepInvocation` per selected step.
//! Derivation is pure; the only side effect of a run's planning phase is
//! the hyperparameter document, written by [`write_rf_config`].

use std::path::{Path, PathBuf};

use contracts::{
    ArtifactRef, ComponentRef, ContractError, RunConfig, StepInvocation, StepName, StepParams,
    StepSelection,
};
use serde_json::Value;

/// Hyperparameter document written into the workspace before training
pub const RF_CONFIG_FILE: &str = "rf_config.json";

/// Version remote components are pinned to
pub const REMOTE_COMPONENT_VERSION: &str = "main";

/// Raw artifact produced by `download`
pub const RAW_ARTIFACT: &str = "sample.csv";
/// Cleaned artifact produced by `basic_cleaning`
pub const CLEAN_ARTIFACT: &str = "clean_sample.csv";
/// Alias a model must carry before `test_regression_model` can use it
pub const PROD_ALIAS: &str = "prod";

/// Derive invocations for `selection`, in master-list order
pub fn plan(
    config: &RunConfig,
    selection: &StepSelection,
    workspace: &Path,
) -> Result<Vec<StepInvocation>, ContractError> {
    selection
        .steps()
        .iter()
        .map(|&step| derive(config, step, workspace))
        .collect()
}

/// Derive the invocation of one step
pub fn derive(
    config: &RunConfig,
    step: StepName,
    workspace: &Path,
) -> Result<StepInvocation, ContractError> {
    Ok(StepInvocation {
        step,
        component: component(config, step),
        params: params(config, step, workspace)?,
    })
}

fn component(config: &RunConfig, step: StepName) -> ComponentRef {
    let repo = Path::new(&config.main.components_repository);
    match step {
        StepName::Download => {
            ComponentRef::new(repo.join("get_data")).with_version(REMOTE_COMPONENT_VERSION)
        }
        StepName::DataSplit => ComponentRef::new(repo.join("train_val_test_split"))
            .with_version(REMOTE_COMPONENT_VERSION),
        other => ComponentRef::new(Path::new(&config.main.local_components).join(other.as_str())),
    }
}

fn latest(name: &str) -> Result<String, ContractError> {
    ArtifactRef::normalize(name)
}

fn params(
    config: &RunConfig,
    step: StepName,
    workspace: &Path,
) -> Result<StepParams, ContractError> {
    let etl = &config.etl;
    let modeling = &config.modeling;

    let params = match step {
        StepName::Download => StepParams::new()
            .with("sample", etl.sample.as_str())
            .with("artifact_name", RAW_ARTIFACT)
            .with("artifact_type", "raw_data")
            .with("artifact_description", "Raw file as downloaded"),

        StepName::BasicCleaning => StepParams::new()
            .with("input_artifact", latest(RAW_ARTIFACT)?)
            .with("output_artifact", CLEAN_ARTIFACT)
            .with("output_type", "clean_data")
            .with(
                "output_description",
                "Data with outliers and null values removed",
            )
            .with("min_price", etl.min_price)
            .with("max_price", etl.max_price),

        StepName::DataCheck => StepParams::new()
            .with("csv", latest(CLEAN_ARTIFACT)?)
            .with("ref", latest(RAW_ARTIFACT)?)
            .with("kl_threshold", config.data_check.kl_threshold)
            .with("min_price", etl.min_price)
            .with("max_price", etl.max_price),

        StepName::DataSplit => StepParams::new()
            .with("input_artifact", RAW_ARTIFACT)
            .with("test_size", modeling.test_size)
            .with("val_size", modeling.val_size)
            .with("random_seed", modeling.random_seed)
            .with("stratify_by", modeling.stratify_by.as_str()),

        StepName::TrainRandomForest => StepParams::new()
            .with("rf_config", rf_config_path(workspace).to_string_lossy().into_owned())
            .with("trainval_artifact", latest("trainval_data.csv")?)
            .with("val_size", modeling.val_size)
            .with("random_seed", modeling.random_seed)
            .with("stratify_by", modeling.stratify_by.as_str())
            .with("output_artifact", modeling.export_artifact.as_str()),

        StepName::TestRegressionModel => StepParams::new()
            .with(
                "mlflow_model",
                ArtifactRef::parse(&format!("{}:{PROD_ALIAS}", modeling.export_artifact))?
                    .to_string(),
            )
            .with("test_artifact", latest("test_data.csv")?),
    };
    Ok(params)
}

/// Where the hyperparameter document lives for a given workspace
pub fn rf_config_path(workspace: &Path) -> PathBuf {
    workspace.join(RF_CONFIG_FILE)
}

/// Serialize `modeling.random_forest` verbatim into the workspace
pub fn write_rf_config(config: &RunConfig, workspace: &Path) -> Result<PathBuf, ContractError> {
    let path = rf_config_path(workspace);
    let document = Value::Object(
        config
            .modeling
            .random_forest
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    );
    let body = serde_json::to_vec_pretty(&document)
        .map_err(|e| ContractError::Other(format!("cannot serialize {RF_CONFIG_FILE}: {e}")))?;
    std::fs::write(&path, body)?;
    Ok(path)
}
