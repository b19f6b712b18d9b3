//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（组件以桩替代，无需外部进程）
//! - artifact 版本与别名语义

#[cfg(test)]
mod contract_tests {
    use contracts::{ArtifactRef, StepName, StepSelection};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        assert_eq!(StepName::MASTER.len(), 6);
    }

    #[test]
    fn test_default_selection_snapshot() {
        let selection = StepSelection::parse("all").unwrap();
        let names: Vec<&str> = selection.steps().iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            [
                "download",
                "basic_cleaning",
                "data_check",
                "data_split",
                "train_random_forest"
            ]
        );
    }

    #[test]
    fn test_reference_normalization() {
        assert_eq!(
            ArtifactRef::normalize("sample.csv").unwrap(),
            "sample.csv:latest"
        );
        assert_eq!(ArtifactRef::normalize("sample.csv:v3").unwrap(), "sample.csv:v3");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ArtifactRef, ContractError, PublishRequest, RunConfig, RunContext, StepInvocation,
        StepName, StepOutcome, StepRunner, TrackingService,
    };
    use orchestrator::{NativeRunner, Pipeline, PipelineConfig, RF_CONFIG_FILE};
    use tracking::LocalTracker;

    const GROUPS: [(&str, usize); 4] = [
        ("Manhattan", 40),
        ("Brooklyn", 30),
        ("Queens", 20),
        ("Bronx", 10),
    ];

    fn config_toml(steps: &str, stratify_by: &str) -> String {
        format!(
            r#"
[main]
project_name = "nyc_airbnb"
experiment_name = "development"
steps = "{steps}"
components_repository = "/components"
local_components = "/project/src"

[etl]
sample = "sample1.csv"
min_price = 10.0
max_price = 350.0

[data_check]
kl_threshold = 0.2

[modeling]
test_size = 0.2
val_size = 0.2
random_seed = 42
stratify_by = "{stratify_by}"
export_artifact = "random_forest_export"

[modeling.random_forest]
n_estimators = 100
max_depth = 15
max_features = 0.5
"#
        )
    }

    fn load(steps: &str, stratify_by: &str) -> RunConfig {
        ConfigLoader::load_from_str(&config_toml(steps, stratify_by), ConfigFormat::Toml).unwrap()
    }

    /// 100 listings, 40/30/20/10 across boroughs
    fn sample_csv() -> String {
        let mut csv = String::from("id,price,neighbourhood_group\n");
        let mut id = 0;
        for (group, count) in GROUPS {
            for _ in 0..count {
                csv.push_str(&format!("{id},{},{group}\n", 50 + id % 200));
                id += 1;
            }
        }
        csv
    }

    /// Stands in for the external components
    ///
    /// `download` publishes the sample through the tracker; every other step
    /// only records what it saw.
    struct StubComponents {
        tracker: Arc<LocalTracker>,
        seen: Arc<Mutex<Vec<StepName>>>,
        rf_config: Arc<Mutex<Option<String>>>,
        fail_on: Option<StepName>,
    }

    impl StubComponents {
        fn new(tracker: Arc<LocalTracker>) -> Self {
            Self {
                tracker,
                seen: Arc::default(),
                rf_config: Arc::default(),
                fail_on: None,
            }
        }
    }

    impl StepRunner for StubComponents {
        async fn run(
            &self,
            invocation: &StepInvocation,
            ctx: &RunContext,
        ) -> Result<StepOutcome, ContractError> {
            self.seen.lock().unwrap().push(invocation.step);
            if self.fail_on == Some(invocation.step) {
                return Err(ContractError::step_execution(
                    invocation.step.as_str(),
                    "component exited with status 1",
                ));
            }

            match invocation.step {
                StepName::Download => {
                    let name = invocation.params.require_str("artifact_name")?;
                    let path = ctx.workspace().join(name);
                    std::fs::write(&path, sample_csv())?;
                    let handle = self
                        .tracker
                        .publish(PublishRequest {
                            name: name.to_string(),
                            artifact_type: "raw_data".into(),
                            description: "Raw file as downloaded".into(),
                            local_path: path,
                        })
                        .await?;
                    self.tracker.await_durable(&handle).await?;
                    Ok(StepOutcome::empty())
                }
                StepName::TrainRandomForest => {
                    let path = invocation.params.require_str("rf_config")?;
                    *self.rf_config.lock().unwrap() = Some(std::fs::read_to_string(path)?);
                    Ok(StepOutcome::empty())
                }
                _ => Ok(StepOutcome::empty()),
            }
        }
    }

    async fn read_artifact(tracker: &LocalTracker, reference: &str) -> String {
        let path = tracker
            .resolve(&ArtifactRef::parse(reference).unwrap())
            .await
            .unwrap();
        std::fs::read_to_string(path).unwrap()
    }

    fn pipeline_with(
        config: RunConfig,
        workspace_root: &Path,
        stub: StubComponents,
    ) -> Pipeline<NativeRunner<LocalTracker, StubComponents>> {
        let tracker = stub.tracker.clone();
        let config = PipelineConfig::from_run_config(config)
            .unwrap()
            .with_workspace_root(workspace_root);
        Pipeline::new(config, NativeRunner::new(tracker, stub))
    }

    fn workspace_entries(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    /// End-to-end: download -> clean -> check -> split -> train
    ///
    /// 验证：
    /// 1. 默认步骤按顺序执行，不含 test_regression_model
    /// 2. data_split 在进程内完成并发布两个分区
    /// 3. 运行结束后工作区被删除
    #[tokio::test]
    async fn test_e2e_default_run() {
        let store = tempfile::tempdir().unwrap();
        let workspaces = tempfile::tempdir().unwrap();
        let tracker = Arc::new(LocalTracker::open(store.path(), "nyc_airbnb").unwrap());
        let stub = StubComponents::new(tracker.clone());
        let seen = stub.seen.clone();

        let pipeline = pipeline_with(load("all", "null"), workspaces.path(), stub);
        let report = pipeline.run().await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                StepName::Download,
                StepName::BasicCleaning,
                StepName::DataCheck,
                StepName::TrainRandomForest,
            ]
        );
        assert_eq!(report.executed.len(), 5);
        assert_eq!(
            report.stats.published,
            vec!["trainval_data.csv:v0", "test_data.csv:v0"]
        );
        assert_eq!(report.stats.succeeded(), 5);

        let test_rows = read_artifact(&tracker, "test_data.csv").await;
        let trainval_rows = read_artifact(&tracker, "trainval_data.csv").await;
        // header + rows
        assert_eq!(test_rows.lines().count(), 21);
        assert_eq!(trainval_rows.lines().count(), 81);

        assert_eq!(workspace_entries(workspaces.path()), 0);
    }

    #[tokio::test]
    async fn test_e2e_same_seed_same_test_set() {
        let store = tempfile::tempdir().unwrap();
        let workspaces = tempfile::tempdir().unwrap();
        let tracker = Arc::new(LocalTracker::open(store.path(), "nyc_airbnb").unwrap());

        for _ in 0..2 {
            let stub = StubComponents::new(tracker.clone());
            let pipeline = pipeline_with(
                load("download,data_split", "null"),
                workspaces.path(),
                stub,
            );
            pipeline.run().await.unwrap();
        }

        assert_eq!(tracker.list("test_data.csv").unwrap().len(), 2);
        let first = read_artifact(&tracker, "test_data.csv:v0").await;
        let second = read_artifact(&tracker, "test_data.csv:v1").await;
        assert_eq!(first, second);

        // sample.csv:latest is the second download
        assert_eq!(tracker.list("sample.csv").unwrap().len(), 2);
        assert_eq!(
            read_artifact(&tracker, "sample.csv").await,
            read_artifact(&tracker, "sample.csv:v1").await
        );
    }

    #[tokio::test]
    async fn test_e2e_stratified_split_keeps_proportions() {
        let store = tempfile::tempdir().unwrap();
        let workspaces = tempfile::tempdir().unwrap();
        let tracker = Arc::new(LocalTracker::open(store.path(), "nyc_airbnb").unwrap());
        let stub = StubComponents::new(tracker.clone());

        let pipeline = pipeline_with(
            load("download,data_split", "neighbourhood_group"),
            workspaces.path(),
            stub,
        );
        pipeline.run().await.unwrap();

        let test_rows = read_artifact(&tracker, "test_data.csv").await;
        for (group, count) in GROUPS {
            let in_test = test_rows
                .lines()
                .filter(|line| line.ends_with(&format!(",{group}")))
                .count();
            // 20% of each class, integer quotas
            assert_eq!(in_test, count / 5, "group {group}");
        }
    }

    #[tokio::test]
    async fn test_e2e_train_only_writes_rf_config() {
        let store = tempfile::tempdir().unwrap();
        let workspaces = tempfile::tempdir().unwrap();
        let tracker = Arc::new(LocalTracker::open(store.path(), "nyc_airbnb").unwrap());
        let stub = StubComponents::new(tracker.clone());
        let seen = stub.seen.clone();
        let rf_config = stub.rf_config.clone();

        let pipeline = pipeline_with(load("train_random_forest", "null"), workspaces.path(), stub);
        let report = pipeline.run().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![StepName::TrainRandomForest]);
        assert!(report.stats.published.is_empty());

        let written = rf_config.lock().unwrap().clone().unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"n_estimators": 100, "max_depth": 15, "max_features": 0.5})
        );
        assert_eq!(workspace_entries(workspaces.path()), 0);
        assert_eq!(RF_CONFIG_FILE, "rf_config.json");
    }

    #[tokio::test]
    async fn test_e2e_missing_stratify_column_aborts() {
        let store = tempfile::tempdir().unwrap();
        let workspaces = tempfile::tempdir().unwrap();
        let tracker = Arc::new(LocalTracker::open(store.path(), "nyc_airbnb").unwrap());
        let stub = StubComponents::new(tracker.clone());
        let seen = stub.seen.clone();

        let pipeline = pipeline_with(load("all", "room_type"), workspaces.path(), stub);
        let err = pipeline.run().await.unwrap_err();

        assert_eq!(err.kind(), "InvalidColumnError");
        // training never started
        assert!(!seen.lock().unwrap().contains(&StepName::TrainRandomForest));
        assert!(tracker.list("test_data.csv").unwrap().is_empty());
        assert_eq!(workspace_entries(workspaces.path()), 0);
    }

    #[tokio::test]
    async fn test_e2e_step_failure_is_not_retried() {
        let store = tempfile::tempdir().unwrap();
        let workspaces = tempfile::tempdir().unwrap();
        let tracker = Arc::new(LocalTracker::open(store.path(), "nyc_airbnb").unwrap());
        let mut stub = StubComponents::new(tracker.clone());
        stub.fail_on = Some(StepName::BasicCleaning);
        let seen = stub.seen.clone();

        let pipeline = pipeline_with(load("all", "null"), workspaces.path(), stub);
        let err = pipeline.run().await.unwrap_err();

        assert_eq!(err.kind(), "StepExecutionError");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![StepName::Download, StepName::BasicCleaning]
        );
        // download's upload is kept, nothing is rolled back
        assert_eq!(tracker.list("sample.csv").unwrap().len(), 1);
        assert_eq!(workspace_entries(workspaces.path()), 0);
    }

    #[tokio::test]
    async fn test_e2e_promote_then_resolve_prod() {
        let store = tempfile::tempdir().unwrap();
        let tracker = LocalTracker::open(store.path(), "nyc_airbnb").unwrap();
        let staging = tempfile::tempdir().unwrap();

        let mut last = None;
        for n in 0..2 {
            let path = staging.path().join("model.pkl");
            std::fs::write(&path, format!("model {n}")).unwrap();
            let handle = tracker
                .publish(PublishRequest {
                    name: "random_forest_export".into(),
                    artifact_type: "model_export".into(),
                    description: "Random Forest pipeline export".into(),
                    local_path: path,
                })
                .await
                .unwrap();
            tracker.await_durable(&handle).await.unwrap();
            last = Some(handle);
        }
        assert_eq!(last.unwrap().version, 1);

        let missing = tracker
            .resolve(&ArtifactRef::parse("random_forest_export:prod").unwrap())
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), "ResolutionError");

        let promoted = tracker
            .promote(&ArtifactRef::parse("random_forest_export:v0").unwrap(), "prod")
            .unwrap();
        assert_eq!(promoted.version, 0);

        assert_eq!(
            read_artifact(&tracker, "random_forest_export:prod").await,
            "model 0"
        );
        assert_eq!(
            read_artifact(&tracker, "random_forest_export").await,
            "model 1"
        );
    }
}
