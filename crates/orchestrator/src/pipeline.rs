//! Pipeline orchestrator - runs the selected steps in order.
//!
//! One run owns one ephemeral workspace. Steps run strictly one after
//! another; the first failure aborts the run and nothing is retried.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use contracts::{
    ContractError, RunConfig, RunContext, StepInvocation, StepName, StepRunner, StepSelection,
};
use observability::RunStats;
use tempfile::TempDir;
use tracing::{info, instrument, warn};

use crate::plan;

/// Prefix of every run workspace directory
pub const WORKSPACE_PREFIX: &str = "ml-pipeline-";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated run configuration
    pub run_config: RunConfig,

    /// Steps to execute (master-list ordered)
    pub selection: StepSelection,

    /// Parent directory of the workspace (None = system temp dir)
    pub workspace_root: Option<PathBuf>,
}

impl PipelineConfig {
    /// Select steps from `main.steps`
    pub fn from_run_config(run_config: RunConfig) -> Result<Self, ContractError> {
        let selection = StepSelection::parse(&run_config.main.steps)?;
        Ok(Self {
            run_config,
            selection,
            workspace_root: None,
        })
    }

    /// Override the configured selection
    pub fn with_selection(mut self, selection: StepSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }
}

/// Statistics from a completed run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Steps executed, in order
    pub executed: Vec<StepName>,

    /// Wall time per executed step
    pub step_durations: Vec<(StepName, Duration)>,

    /// Total duration of the run
    pub duration: Duration,

    /// Aggregated step metrics, including the artifacts in-process steps published
    pub stats: RunStats,
}

/// Main pipeline orchestrator
pub struct Pipeline<R> {
    config: PipelineConfig,
    runner: R,
}

impl<R: StepRunner> Pipeline<R> {
    pub fn new(config: PipelineConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Invocations the run would execute, against a placeholder workspace
    pub fn plan(&self, workspace: &std::path::Path) -> Result<Vec<StepInvocation>, ContractError> {
        plan::plan(&self.config.run_config, &self.config.selection, workspace)
    }

    /// Run the selected steps to completion
    ///
    /// The workspace is removed on every exit path when the `TempDir` drops.
    #[instrument(
        name = "pipeline_run",
        skip(self),
        fields(
            project = %self.config.run_config.main.project_name,
            run_group = %self.config.run_config.main.experiment_name,
        )
    )]
    pub async fn run(&self) -> Result<RunReport, ContractError> {
        let start_time = Instant::now();
        let workspace = self.create_workspace()?;
        let main = &self.config.run_config.main;
        let ctx = RunContext::new(&main.project_name, &main.experiment_name, workspace.path());

        let invocations = self.plan(workspace.path())?;
        info!(
            steps = ?self.config.selection.steps(),
            workspace = %workspace.path().display(),
            "Pipeline starting"
        );

        let mut report = RunReport::default();
        for invocation in &invocations {
            let step = invocation.step;

            if step == StepName::TrainRandomForest {
                let path = plan::write_rf_config(&self.config.run_config, workspace.path())?;
                info!(path = %path.display(), "Hyperparameters serialized");
            }

            info!(step = %step, "Step starting");
            let step_start = Instant::now();
            let result = self.runner.run(invocation, &ctx).await;
            let elapsed = step_start.elapsed();
            report.stats.record_step(step.as_str(), result.is_ok(), elapsed);

            match result {
                Ok(outcome) => {
                    info!(
                        step = %step,
                        elapsed_secs = elapsed.as_secs_f64(),
                        published = ?outcome.published,
                        "Step finished"
                    );
                    report.executed.push(step);
                    report.step_durations.push((step, elapsed));
                    report.stats.record_published(&outcome.published);
                }
                Err(e) => {
                    warn!(step = %step, error = %e, kind = e.kind(), "Step failed, aborting run");
                    return Err(attribute_failure(step, e));
                }
            }
        }

        report.duration = start_time.elapsed();
        info!(
            duration_secs = report.duration.as_secs_f64(),
            steps = report.executed.len(),
            "Pipeline complete"
        );
        Ok(report)
    }

    fn create_workspace(&self) -> Result<TempDir, ContractError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match &self.config.workspace_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Keep step-level error kinds, wrap everything else as a step failure
fn attribute_failure(step: StepName, error: ContractError) -> ContractError {
    match error {
        e @ (ContractError::StepExecution { .. }
        | ContractError::Resolution { .. }
        | ContractError::InvalidColumn { .. }
        | ContractError::Upload { .. }) => e,
        other => ContractError::step_execution(step.as_str(), other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_config;
    use std::sync::Mutex;

    /// Records what each step saw; fails on request
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(StepName, RunContext)>>,
        rf_config: Mutex<Option<String>>,
        fail_on: Option<StepName>,
    }

    impl StepRunner for Recorder {
        async fn run(
            &self,
            invocation: &StepInvocation,
            ctx: &RunContext,
        ) -> Result<contracts::StepOutcome, ContractError> {
            self.seen
                .lock()
                .unwrap()
                .push((invocation.step, ctx.clone()));
            if invocation.step == StepName::TrainRandomForest {
                let path = invocation.params.require_str("rf_config")?;
                *self.rf_config.lock().unwrap() = std::fs::read_to_string(path).ok();
            }
            if self.fail_on == Some(invocation.step) {
                return Err(ContractError::Other("boom".into()));
            }
            if invocation.step == StepName::DataSplit {
                return Ok(contracts::StepOutcome {
                    published: vec!["trainval_data.csv:v0".into(), "test_data.csv:v0".into()],
                });
            }
            Ok(contracts::StepOutcome::empty())
        }
    }

    fn pipeline(steps: &str, runner: Recorder) -> Pipeline<Recorder> {
        let config = PipelineConfig::from_run_config(sample_config())
            .unwrap()
            .with_selection(StepSelection::parse(steps).unwrap());
        Pipeline::new(config, runner)
    }

    #[tokio::test]
    async fn test_all_excludes_regression_test() {
        let p = pipeline("all", Recorder::default());
        let report = p.run().await.unwrap();
        assert_eq!(report.executed.len(), 5);
        assert!(!report.executed.contains(&StepName::TestRegressionModel));
        assert_eq!(report.stats.succeeded(), 5);
    }

    #[tokio::test]
    async fn test_published_artifacts_recorded_once() {
        let p = pipeline("download,data_split", Recorder::default());
        let report = p.run().await.unwrap();
        assert_eq!(
            report.stats.published,
            ["trainval_data.csv:v0", "test_data.csv:v0"]
        );
        assert_eq!(report.stats.summary().published, report.stats.published);
    }

    #[tokio::test]
    async fn test_token_order_ignored() {
        let p = pipeline("data_split,download", Recorder::default());
        let report = p.run().await.unwrap();
        assert_eq!(report.executed, [StepName::Download, StepName::DataSplit]);
    }

    #[tokio::test]
    async fn test_steps_share_context_and_workspace_is_removed() {
        let p = pipeline("download,basic_cleaning", Recorder::default());
        p.run().await.unwrap();

        let seen = p.runner.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, seen[1].1);
        assert_eq!(seen[0].1.project_name, "nyc_airbnb");
        assert_eq!(seen[0].1.experiment_name, "development");
        let workspace = &seen[0].1.workspace;
        assert!(workspace
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(WORKSPACE_PREFIX));
        assert!(!workspace.exists());
    }

    #[tokio::test]
    async fn test_train_only_serializes_hyperparameters_first() {
        let p = pipeline("train_random_forest", Recorder::default());
        let report = p.run().await.unwrap();
        assert_eq!(report.executed, [StepName::TrainRandomForest]);

        let body = p.runner.rf_config.lock().unwrap().clone().unwrap();
        let doc: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&body).unwrap();
        let expected: serde_json::Map<String, serde_json::Value> = sample_config()
            .modeling
            .random_forest
            .into_iter()
            .collect();
        assert_eq!(doc, expected);
    }

    #[tokio::test]
    async fn test_failure_aborts_and_cleans_workspace() {
        let runner = Recorder {
            fail_on: Some(StepName::BasicCleaning),
            ..Default::default()
        };
        let p = pipeline("all", runner);
        let err = p.run().await.unwrap_err();
        assert_eq!(err.kind(), "StepExecutionError");
        assert!(err.to_string().contains("basic_cleaning"), "got: {err}");

        let seen = p.runner.seen.lock().unwrap();
        let steps: Vec<_> = seen.iter().map(|(s, _)| *s).collect();
        assert_eq!(steps, [StepName::Download, StepName::BasicCleaning]);
        assert!(!seen[0].1.workspace.exists());
    }

    #[tokio::test]
    async fn test_workspace_root_respected() {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig::from_run_config(sample_config())
            .unwrap()
            .with_selection(StepSelection::parse("download").unwrap())
            .with_workspace_root(root.path());
        let p = Pipeline::new(config, Recorder::default());
        p.run().await.unwrap();

        let seen = p.runner.seen.lock().unwrap();
        assert_eq!(seen[0].1.workspace.parent(), Some(root.path()));
    }

    #[test]
    fn test_attribute_failure_keeps_step_kinds() {
        let kept = attribute_failure(
            StepName::DataSplit,
            ContractError::invalid_column("x", &["a".to_string()]),
        );
        assert_eq!(kept.kind(), "InvalidColumnError");

        let wrapped = attribute_failure(StepName::DataSplit, ContractError::Other("io".into()));
        assert_eq!(wrapped.kind(), "StepExecutionError");
    }
}
