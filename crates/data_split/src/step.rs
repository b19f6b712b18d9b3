//! Artifact-versioned split step
//!
//! resolve input -> split -> write partitions -> publish each -> wait for the
//! last upload to be durable. Already published partitions are not rolled
//! back when a later one fails, but they are still waited on before the
//! error is returned.

use std::path::{Path, PathBuf};

use contracts::{
    ArtifactHandle, ArtifactRef, ContractError, PublishRequest, StepParams, TrackingService,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::split::{split_indices, Partition, SplitOptions, Stratify};
use crate::table::Table;

/// Artifact type of every published partition
pub const SPLIT_ARTIFACT_TYPE: &str = "split_data";

/// Step arguments
#[derive(Debug, Clone, PartialEq)]
pub struct SplitArgs {
    /// Input reference, version optional
    pub input_artifact: String,
    pub options: SplitOptions,
}

impl SplitArgs {
    pub fn new(input_artifact: impl Into<String>, options: SplitOptions) -> Self {
        Self {
            input_artifact: input_artifact.into(),
            options,
        }
    }

    /// Build from derived step parameters
    pub fn from_params(params: &StepParams) -> Result<Self, ContractError> {
        let stratify: Stratify = params.require_str("stratify_by")?.parse()?;
        let options = SplitOptions::new(
            params.require_f64("test_size")?,
            params.require_f64("val_size")?,
            params.require_u64("random_seed")?,
            stratify,
        )?;
        Ok(Self::new(params.require_str("input_artifact")?, options))
    }
}

/// One published partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedPartition {
    pub partition: String,
    pub artifact: String,
    pub version: u32,
    pub rows: usize,
}

/// Result of one split run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitReport {
    /// Fully-qualified input reference
    pub input: String,
    pub val_size: f64,
    pub partitions: Vec<PublishedPartition>,
}

/// The split step, bound to a tracking service
pub struct DataSplitStep<'a, T> {
    tracker: &'a T,
}

impl<'a, T> DataSplitStep<'a, T>
where
    T: TrackingService + Sync,
{
    pub fn new(tracker: &'a T) -> Self {
        Self { tracker }
    }

    /// Run the split, writing partition files under `workspace`
    ///
    /// Returns only after the last published partition is durable.
    #[instrument(
        name = "data_split",
        skip(self, args, workspace),
        fields(input = %args.input_artifact, stratify_by = %args.options.stratify)
    )]
    pub async fn run(
        &self,
        args: &SplitArgs,
        workspace: &Path,
    ) -> Result<SplitReport, ContractError> {
        let input = ArtifactRef::parse(&args.input_artifact)?.qualified();
        info!(reference = %input, "fetching input artifact");

        let path = self.tracker.resolve(&input).await?;
        let table = Table::read_csv(&path)?;
        debug!(rows = table.len(), columns = table.headers().len(), "input loaded");

        let labels = match args.options.stratify.column() {
            Some(column) => {
                let index = table.column_index(column)?;
                Some(table.column(index))
            }
            None => None,
        };

        info!(
            test_size = args.options.test_size,
            random_seed = args.options.random_seed,
            "splitting trainval and test"
        );
        let partitions = split_indices(table.len(), labels.as_deref(), &args.options);

        let mut published = Vec::new();
        let mut last_handle = None;
        for (partition, rows) in partitions.iter() {
            let outcome = self
                .publish_partition(&table, partition, rows, &input, workspace)
                .await;
            match outcome {
                Ok((entry, handle)) => {
                    published.push(entry);
                    last_handle = Some(handle);
                }
                Err(e) => {
                    // 已排队的上传仍需落盘，workspace 随后可能被删除
                    if let Some(handle) = &last_handle {
                        if let Err(flush) = self.tracker.await_durable(handle).await {
                            warn!(error = %flush, "earlier partition not durable");
                        }
                    }
                    return Err(e);
                }
            }
        }

        // Awaiting the last handle also collects every earlier acknowledgment.
        if let Some(handle) = &last_handle {
            self.tracker.await_durable(handle).await?;
        }
        info!(partitions = published.len(), "split published");

        Ok(SplitReport {
            input: input.to_string(),
            val_size: args.options.val_size,
            partitions: published,
        })
    }

    async fn publish_partition(
        &self,
        table: &Table,
        partition: Partition,
        rows: &[usize],
        input: &ArtifactRef,
        workspace: &Path,
    ) -> Result<(PublishedPartition, ArtifactHandle), ContractError> {
        let artifact = partition.artifact_name();
        let local_path: PathBuf = workspace.join(&artifact);
        table.write_csv(&local_path, rows)?;
        observability::record_partition_rows(partition.as_str(), rows.len());

        info!(artifact = %artifact, rows = rows.len(), "uploading partition");
        let handle = self
            .tracker
            .publish(PublishRequest {
                name: artifact.clone(),
                artifact_type: SPLIT_ARTIFACT_TYPE.to_string(),
                description: format!("{partition} split of {input}"),
                local_path,
            })
            .await?;
        observability::record_artifact_published(SPLIT_ARTIFACT_TYPE);

        let entry = PublishedPartition {
            partition: partition.as_str().to_string(),
            artifact,
            version: handle.version,
            rows: rows.len(),
        };
        Ok((entry, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tracking::{MockConfig, MockTracker, TrackerEvent};

    fn sample_csv(rows: usize) -> String {
        let mut out = String::from("id,neighbourhood_group,price\n");
        for i in 0..rows {
            let group = if i % 4 == 0 { "Manhattan" } else { "Brooklyn" };
            out.push_str(&format!("{i},{group},{}\n", 50 + i));
        }
        out
    }

    fn args(input: &str, stratify: &str) -> SplitArgs {
        SplitArgs::new(
            input,
            SplitOptions::new(0.2, 0.0, 42, stratify.parse().unwrap()).unwrap(),
        )
    }

    fn ids(content: &[u8]) -> HashSet<String> {
        let table = Table::from_reader(content).unwrap();
        table.column(0).into_iter().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn test_split_publishes_both_partitions() {
        let tracker = MockTracker::new().unwrap();
        tracker.seed("sample.csv", "raw_data", sample_csv(100));
        let workspace = tempfile::tempdir().unwrap();

        let report = DataSplitStep::new(&tracker)
            .run(&args("sample.csv", "null"), workspace.path())
            .await
            .unwrap();

        assert_eq!(report.input, "sample.csv:latest");
        let names: Vec<_> = report.partitions.iter().map(|p| p.artifact.as_str()).collect();
        assert_eq!(names, ["trainval_data.csv", "test_data.csv"]);
        assert_eq!(report.partitions[0].rows, 80);
        assert_eq!(report.partitions[1].rows, 20);

        let trainval = ids(&tracker.latest_content("trainval_data.csv").unwrap());
        let test = ids(&tracker.latest_content("test_data.csv").unwrap());
        assert!(trainval.is_disjoint(&test));
        assert_eq!(trainval.len() + test.len(), 100);

        let (artifact_type, description) = tracker.metadata("test_data.csv", 0).unwrap();
        assert_eq!(artifact_type, "split_data");
        assert_eq!(description, "test split of sample.csv:latest");
    }

    #[tokio::test]
    async fn test_success_only_after_last_upload_durable() {
        let tracker = MockTracker::new().unwrap();
        tracker.seed("sample.csv", "raw_data", sample_csv(30));
        let workspace = tempfile::tempdir().unwrap();

        DataSplitStep::new(&tracker)
            .run(&args("sample.csv", "null"), workspace.path())
            .await
            .unwrap();

        assert_eq!(tracker.pending_count(), 0);
        let events = tracker.events();
        assert_eq!(
            events.last(),
            Some(&TrackerEvent::Durable {
                name: "test_data.csv".into(),
                version: 0
            })
        );
    }

    #[tokio::test]
    async fn test_same_seed_same_test_rows() {
        let tracker = MockTracker::new().unwrap();
        tracker.seed("sample.csv", "raw_data", sample_csv(100));
        let workspace = tempfile::tempdir().unwrap();
        let step = DataSplitStep::new(&tracker);

        step.run(&args("sample.csv:v0", "neighbourhood_group"), workspace.path())
            .await
            .unwrap();
        step.run(&args("sample.csv:v0", "neighbourhood_group"), workspace.path())
            .await
            .unwrap();

        // Second run creates a new version instead of touching the first.
        assert_eq!(tracker.version_count("test_data.csv"), 2);
        assert_eq!(
            ids(&tracker.content("test_data.csv", 0).unwrap()),
            ids(&tracker.content("test_data.csv", 1).unwrap())
        );
    }

    #[tokio::test]
    async fn test_explicit_version_used_verbatim() {
        let tracker = MockTracker::new().unwrap();
        tracker.seed("sample.csv", "raw_data", sample_csv(10));
        tracker.seed("sample.csv", "raw_data", sample_csv(20));
        let workspace = tempfile::tempdir().unwrap();

        let report = DataSplitStep::new(&tracker)
            .run(&args("sample.csv:v0", "null"), workspace.path())
            .await
            .unwrap();
        assert_eq!(report.input, "sample.csv:v0");
        assert_eq!(report.partitions.iter().map(|p| p.rows).sum::<usize>(), 10);
        assert!(tracker.events().contains(&TrackerEvent::Resolved {
            reference: "sample.csv:v0".into()
        }));
    }

    #[tokio::test]
    async fn test_missing_stratify_column() {
        let tracker = MockTracker::new().unwrap();
        tracker.seed("sample.csv", "raw_data", sample_csv(10));
        let workspace = tempfile::tempdir().unwrap();

        let err = DataSplitStep::new(&tracker)
            .run(&args("sample.csv", "borough"), workspace.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidColumnError");
        assert_eq!(tracker.version_count("trainval_data.csv"), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_input() {
        let tracker = MockTracker::new().unwrap();
        let workspace = tempfile::tempdir().unwrap();

        let err = DataSplitStep::new(&tracker)
            .run(&args("sample.csv", "null"), workspace.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ResolutionError");
    }

    #[tokio::test]
    async fn test_upload_failure_still_flushes_earlier_partition() {
        let tracker = MockTracker::with_config(MockConfig {
            fail_publish: vec!["test_data.csv".into()],
            ..Default::default()
        })
        .unwrap();
        tracker.seed("sample.csv", "raw_data", sample_csv(10));
        let workspace = tempfile::tempdir().unwrap();

        let err = DataSplitStep::new(&tracker)
            .run(&args("sample.csv", "null"), workspace.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UploadError");
        assert!(err.to_string().contains("test_data.csv"), "got: {err}");

        // trainval was handed over already: kept and made durable before returning
        drop(workspace);
        assert_eq!(tracker.pending_count(), 0);
        assert_eq!(tracker.version_count("trainval_data.csv"), 1);
        assert_eq!(tracker.version_count("test_data.csv"), 0);
        assert!(tracker.events().contains(&TrackerEvent::Durable {
            name: "trainval_data.csv".into(),
            version: 0,
        }));
    }

    #[tokio::test]
    async fn test_zero_test_size_publishes_empty_partition() {
        let tracker = MockTracker::new().unwrap();
        tracker.seed("sample.csv", "raw_data", sample_csv(5));
        let workspace = tempfile::tempdir().unwrap();

        let args = SplitArgs::new(
            "sample.csv",
            SplitOptions::new(0.0, 0.0, 42, Stratify::None).unwrap(),
        );
        let report = DataSplitStep::new(&tracker)
            .run(&args, workspace.path())
            .await
            .unwrap();
        assert_eq!(report.partitions[1].rows, 0);
        assert_eq!(
            tracker.latest_content("test_data.csv").unwrap(),
            "id,neighbourhood_group,price\n"
        );
    }

    #[test]
    fn test_args_from_params() {
        let params = StepParams::new()
            .with("input_artifact", "sample.csv")
            .with("test_size", 0.2)
            .with("val_size", 0.2)
            .with("random_seed", 42)
            .with("stratify_by", "neighbourhood_group");
        let args = SplitArgs::from_params(&params).unwrap();
        assert_eq!(args.input_artifact, "sample.csv");
        assert_eq!(
            args.options.stratify,
            Stratify::Column("neighbourhood_group".into())
        );

        let missing = StepParams::new().with("input_artifact", "sample.csv");
        assert!(SplitArgs::from_params(&missing).unwrap_err().is_configuration());
    }
}
