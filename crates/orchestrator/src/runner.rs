//! Step runners
//!
//! - [`ProcessRunner`]: launches `<location>/<entry_point>` as a child process
//! - [`NativeRunner`]: runs `data_split` in-process, delegates the rest

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use contracts::{
    ContractError, RunContext, StepInvocation, StepName, StepOutcome, StepRunner,
    TrackingService,
};
use data_split::{DataSplitStep, SplitArgs};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Env vars a child step sees
pub const ENV_PROJECT: &str = "ML_PIPELINE_PROJECT";
pub const ENV_RUN_GROUP: &str = "ML_PIPELINE_RUN_GROUP";
pub const ENV_WORKSPACE: &str = "ML_PIPELINE_WORKSPACE";
pub const ENV_COMPONENT_VERSION: &str = "ML_PIPELINE_COMPONENT_VERSION";
pub const ENV_TRACKING_ROOT: &str = "ML_PIPELINE_TRACKING_ROOT";

/// stderr lines kept in a `StepExecutionError`
const STDERR_TAIL_LINES: usize = 20;

/// Runs each step as an external executable
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    tracking_root: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose the artifact store location to children
    pub fn with_tracking_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.tracking_root = Some(root.into());
        self
    }

    fn command(&self, invocation: &StepInvocation, ctx: &RunContext) -> Command {
        let mut cmd = Command::new(invocation.component.entry_path());
        cmd.args(invocation.params.to_cli_args())
            .current_dir(ctx.workspace())
            .env(ENV_PROJECT, &ctx.project_name)
            .env(ENV_RUN_GROUP, &ctx.experiment_name)
            .env(ENV_WORKSPACE, ctx.workspace())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(version) = &invocation.component.version {
            cmd.env(ENV_COMPONENT_VERSION, version);
        }
        if let Some(root) = &self.tracking_root {
            cmd.env(ENV_TRACKING_ROOT, root);
        }
        cmd
    }
}

impl StepRunner for ProcessRunner {
    #[instrument(
        name = "process_step",
        skip(self, invocation, ctx),
        fields(step = %invocation.step, component = %invocation.component.location.display())
    )]
    async fn run(
        &self,
        invocation: &StepInvocation,
        ctx: &RunContext,
    ) -> Result<StepOutcome, ContractError> {
        let program = invocation.component.entry_path();
        let step = invocation.step.as_str();
        debug!(program = %program.display(), args = ?invocation.params.to_cli_args(), "launching");

        let output = self
            .command(invocation, ctx)
            .output()
            .await
            .map_err(|e| {
                ContractError::step_execution(
                    step,
                    format!("cannot start {}: {e}", program.display()),
                )
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let tail = stderr_tail(&stderr, STDERR_TAIL_LINES);
            warn!(status = %output.status, "step exited unsuccessfully");
            return Err(ContractError::step_execution(
                step,
                format!("{} exited with {}: {tail}", program.display(), output.status),
            ));
        }

        for line in stderr.lines() {
            debug!(target: "step_stderr", "{line}");
        }
        info!("step process finished");
        Ok(StepOutcome::empty())
    }
}

fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// Runs `data_split` in-process against a tracking service
///
/// Every other step goes to `inner`.
pub struct NativeRunner<T, R> {
    tracker: Arc<T>,
    inner: R,
}

impl<T, R> NativeRunner<T, R> {
    pub fn new(tracker: Arc<T>, inner: R) -> Self {
        Self { tracker, inner }
    }

    pub fn tracker(&self) -> &Arc<T> {
        &self.tracker
    }
}

impl<T, R> StepRunner for NativeRunner<T, R>
where
    T: TrackingService + Send + Sync,
    R: StepRunner + Sync,
{
    async fn run(
        &self,
        invocation: &StepInvocation,
        ctx: &RunContext,
    ) -> Result<StepOutcome, ContractError> {
        if invocation.step != StepName::DataSplit {
            return self.inner.run(invocation, ctx).await;
        }

        let args = SplitArgs::from_params(&invocation.params)?;
        let report = DataSplitStep::new(self.tracker.as_ref())
            .run(&args, ctx.workspace())
            .await?;

        Ok(StepOutcome {
            published: report
                .partitions
                .into_iter()
                .map(|p| format!("{}:v{}", p.artifact, p.version))
                .collect(),
        })
    }
}
