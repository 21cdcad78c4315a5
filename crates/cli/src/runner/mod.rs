//! Runner - wires the input reader, the dispatcher and the command job.
//!
//! ```text
//! input lines --mpsc--> Dispatcher::work --spawn--> CommandJob::execute
//!      ^                                                   |
//!      +------------- stop (Ctrl+C / fail_fast) -----------+
//! ```

mod command_job;
mod input;

pub use command_job::{CommandJob, CommandOutcome};
pub use input::{forward_lines, InputSpec};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncBufRead;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use contracts::PoolBlueprint;
use dispatcher::{Callback, DispatcherBuilder};
use observability::{record_dispatcher_snapshot, record_job_started, RunSummary};

use crate::error::{CliError, Result};

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Validated blueprint (must carry a command)
    pub blueprint: PoolBlueprint,
    /// Silence command stdout/stderr
    pub quiet_commands: bool,
}

/// One run of the job pool over an input stream
pub struct Runner {
    config: RunnerConfig,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run over the given input until it is exhausted or `shutdown` resolves
    ///
    /// After `shutdown` no further inputs are dispatched; commands already
    /// started run to completion.
    pub async fn run<R, F>(self, reader: R, shutdown: F) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        let blueprint = self.config.blueprint;
        let command = blueprint.command.clone().ok_or(CliError::MissingCommand)?;
        let pool_name = blueprint.pool.name.clone();
        let started = Instant::now();

        let (stop_tx, stop_rx) = watch::channel(false);
        let job = Arc::new(CommandJob::new(
            pool_name.clone(),
            command,
            self.config.quiet_commands,
            stop_tx.clone(),
        ));

        let start_pool = pool_name.clone();
        let job_handle = Arc::clone(&job);
        let pool = DispatcherBuilder::from_section(&blueprint.pool)
            .on_start(move || record_job_started(&start_pool))
            .build(move |input: String| {
                let job = Arc::clone(&job_handle);
                async move {
                    job.execute(input).await;
                }
            })?;

        let metrics = Arc::clone(pool.metrics_handle());
        let end_pool = pool_name.clone();
        pool.register_callback(Callback::on_end(move || {
            let snapshot = metrics.snapshot();
            record_dispatcher_snapshot(&end_pool, &snapshot);
            debug!(
                completed = snapshot.completed,
                in_flight = snapshot.in_flight,
                "Job finished"
            );
        }));

        let (tx, rx) = mpsc::channel::<String>(blueprint.pool.input_buffer);
        let intake = pool.spawn(rx);
        let reader = tokio::spawn(forward_lines(reader, tx, stop_rx));

        info!(
            pool = %pool_name,
            capacity = pool.capacity(),
            "Job pool running"
        );

        tokio::select! {
            _ = pool.wait() => {}
            _ = shutdown => {
                warn!("Received shutdown signal, waiting for running commands to finish...");
                stop_tx.send_replace(true);
                pool.wait().await;
            }
        }

        match reader.await {
            Ok(Ok(forwarded)) => debug!(forwarded, "Input reader finished"),
            Ok(Err(e)) => error!(error = %e, "Input reader failed"),
            Err(e) => error!(error = ?e, "Input reader task panicked"),
        }
        match intake.await {
            Ok(result) => result?,
            Err(e) => error!(error = ?e, "Intake task panicked"),
        }

        let snapshot = pool.metrics();
        record_dispatcher_snapshot(&pool_name, &snapshot);
        let summary = job.stats().summary(started.elapsed(), snapshot);

        info!(
            submitted = summary.submitted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Job pool finished"
        );

        Ok(summary)
    }
}
