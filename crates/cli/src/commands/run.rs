//! `run` command implementation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::StepRunner;
use orchestrator::{NativeRunner, Pipeline, PipelineConfig, ProcessRunner};
use tracing::{error, info, warn};
use tracking::LocalTracker;

use super::load_config;
use crate::cli::RunArgs;
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut run_config = load_config(&args.config, &args.overrides, args.steps.as_deref())?;
    if let Some(root) = &args.tracking_root {
        info!(root = %root.display(), "Overriding tracking root from CLI");
        run_config.tracking.root = root.clone();
    }

    let mut pipeline_config =
        PipelineConfig::from_run_config(run_config).map_err(CliError::from)?;
    if let Some(root) = &args.workspace_root {
        pipeline_config = pipeline_config.with_workspace_root(root);
    }

    let main = &pipeline_config.run_config.main;
    info!(
        project = %main.project_name,
        run_group = %main.experiment_name,
        steps = ?pipeline_config.selection.steps(),
        "Configuration loaded"
    );

    // Dry run - just derive and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        let pipeline = Pipeline::new(pipeline_config, ProcessRunner::new());
        let invocations = pipeline
            .plan(Path::new("<workspace>"))
            .map_err(CliError::from)?;
        super::info::print_plan(&pipeline.config().run_config, &invocations);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let tracking_root = pipeline_config.run_config.tracking.root.clone();
    let processes = ProcessRunner::new().with_tracking_root(&tracking_root);

    if args.external_split {
        execute(Pipeline::new(pipeline_config, processes)).await
    } else {
        let tracker = LocalTracker::open(
            &tracking_root,
            &pipeline_config.run_config.main.project_name,
        )
        .map_err(CliError::from)
        .context("Failed to open artifact store")?;
        let runner = NativeRunner::new(Arc::new(tracker), processes);
        execute(Pipeline::new(pipeline_config, runner)).await
    }
}

async fn execute<R: StepRunner>(pipeline: Pipeline<R>) -> Result<()> {
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    // Dropping the run future on shutdown removes the workspace and kills
    // the running child.
    tokio::select! {
        result = pipeline.run() => {
            match result {
                Ok(report) => {
                    info!(
                        steps = report.executed.len(),
                        published = ?report.stats.published,
                        duration_secs = report.duration.as_secs_f64(),
                        "Pipeline completed successfully"
                    );
                    println!("\n{}", report.stats.summary());
                }
                Err(e) => {
                    return Err(CliError::from(e)).context("Pipeline execution failed");
                }
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, run aborted");
            anyhow::bail!("Pipeline interrupted");
        }
    }

    info!("ML Pipeline finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
