//! Pipeline 指标收集模块
//!
//! 记录步骤执行、分区行数和 artifact 发布的指标，并在内存中聚合运行摘要。

use std::time::Duration;

use metrics::{counter, histogram};

/// 记录一个步骤结束
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_step_finished;
///
/// let started = Instant::now();
/// let result = runner.run(&invocation, &ctx).await;
/// record_step_finished("data_split", result.is_ok(), started.elapsed());
/// ```
pub fn record_step_finished(step: &str, success: bool, elapsed: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ml_pipeline_steps_total",
        "step" => step.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "ml_pipeline_step_duration_seconds",
        "step" => step.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// 记录分区行数
pub fn record_partition_rows(partition: &str, rows: usize) {
    histogram!(
        "ml_pipeline_partition_rows",
        "partition" => partition.to_string()
    )
    .record(rows as f64);
}

/// 记录 artifact 发布
pub fn record_artifact_published(artifact_type: &str) {
    counter!(
        "ml_pipeline_artifacts_published_total",
        "type" => artifact_type.to_string()
    )
    .increment(1);
}

/// 单个步骤的执行记录
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub step: String,
    pub success: bool,
    pub duration: Duration,
}

/// 一次运行的内存聚合，用于结束时打印摘要
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// 按执行顺序的步骤记录
    pub steps: Vec<StepRecord>,

    /// 本次运行发布的 artifact (`name:vN`)
    pub published: Vec<String>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录步骤结束并同步到 metrics
    pub fn record_step(&mut self, step: &str, success: bool, duration: Duration) {
        record_step_finished(step, success, duration);
        self.steps.push(StepRecord {
            step: step.to_string(),
            success,
            duration,
        });
    }

    pub fn record_published(&mut self, artifacts: &[String]) {
        self.published.extend_from_slice(artifacts);
    }

    /// 成功的步骤数
    pub fn succeeded(&self) -> usize {
        self.steps.iter().filter(|s| s.success).count()
    }

    /// 失败的步骤 (fail-fast 下最多一个)
    pub fn failed_step(&self) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| !s.success)
            .map(|s| s.step.as_str())
    }

    pub fn slowest_step(&self) -> Option<&StepRecord> {
        self.steps.iter().max_by_key(|s| s.duration)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            steps_run: self.steps.len(),
            steps_succeeded: self.succeeded(),
            failed_step: self.failed_step().map(str::to_string),
            total_duration: self.steps.iter().map(|s| s.duration).sum(),
            slowest: self
                .slowest_step()
                .map(|s| (s.step.clone(), s.duration)),
            published: self.published.clone(),
        }
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub steps_run: usize,
    pub steps_succeeded: usize,
    pub failed_step: Option<String>,
    pub total_duration: Duration,
    pub slowest: Option<(String, Duration)>,
    pub published: Vec<String>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pipeline Run Summary ===")?;
        writeln!(
            f,
            "Steps: {}/{} succeeded",
            self.steps_succeeded, self.steps_run
        )?;
        if let Some(step) = &self.failed_step {
            writeln!(f, "Failed step: {}", step)?;
        }
        writeln!(f, "Total time: {:.2}s", self.total_duration.as_secs_f64())?;
        if let Some((step, duration)) = &self.slowest {
            writeln!(f, "Slowest step: {} ({:.2}s)", step, duration.as_secs_f64())?;
        }

        if !self.published.is_empty() {
            writeln!(f, "Published:")?;
            for artifact in &self.published {
                writeln!(f, "  {}", artifact)?;
            }
        }

        Ok(())
    }
}
