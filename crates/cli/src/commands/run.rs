//! `run` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::ConfigLoader;
use dispatcher::MetricsSnapshot;
use observability::RunSummary;

use crate::cli::RunArgs;
use crate::runner::{InputSpec, Runner, RunnerConfig};
use crate::settings::{apply_run_overrides, load_blueprint};

/// Run summary for JSON output
#[derive(Serialize)]
struct SummaryOutput {
    pool: String,
    succeeded: u64,
    failed: u64,
    elapsed_secs: f64,
    jobs_per_sec: f64,
    mean_duration_ms: f64,
    dispatcher: MetricsSnapshot,
}

impl SummaryOutput {
    fn new(pool: &str, summary: &RunSummary) -> Self {
        Self {
            pool: pool.to_string(),
            succeeded: summary.succeeded,
            failed: summary.failed,
            elapsed_secs: summary.elapsed.as_secs_f64(),
            jobs_per_sec: summary.jobs_per_sec,
            mean_duration_ms: summary.duration_ms.mean,
            dispatcher: summary.dispatcher,
        }
    }
}

/// Execute the `run` command
pub async fn run_pool(args: &RunArgs, quiet: bool) -> Result<()> {
    let mut blueprint = load_blueprint(args.config.as_deref())
        .context("Failed to load configuration")?;
    apply_run_overrides(&mut blueprint, args).context("Invalid run configuration")?;

    info!(
        pool = %blueprint.pool.name,
        capacity = blueprint.pool.capacity,
        input_buffer = blueprint.pool.input_buffer,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        let effective = if args.json {
            ConfigLoader::to_json(&blueprint)
        } else {
            ConfigLoader::to_toml(&blueprint)
        }
        .context("Failed to serialize effective configuration")?;
        println!("{}", effective);
        return Ok(());
    }

    let input = InputSpec::from_arg(args.input.as_deref());
    let reader = input.open().await?;
    let pool_name = blueprint.pool.name.clone();

    let runner = Runner::new(RunnerConfig {
        blueprint,
        quiet_commands: quiet,
    });
    let summary = runner
        .run(reader, shutdown_signal())
        .await
        .context("Job pool execution failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&SummaryOutput::new(&pool_name, &summary))
            .context("Failed to serialize run summary")?;
        println!("{}", json);
    } else if !quiet {
        print!("{}", summary);
    }

    if summary.failed > 0 || summary.panicked > 0 {
        anyhow::bail!(
            "{} of {} jobs failed",
            summary.failed + summary.panicked,
            summary.submitted
        );
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed that branch never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
