//! CommandJob - runs the configured program for one input
//!
//! The job owns its failures: a non-zero exit or a spawn error is logged,
//! counted and optionally turned into a stop request, but never surfaces to
//! the dispatcher.

use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use contracts::CommandSection;
use observability::{record_job_finished, RunMetricsAggregator};

/// Result of running one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exited with status 0
    Success,
    /// Exited with a non-zero status (`None` when killed by a signal)
    Failed { code: Option<i32> },
    /// Could not be started
    SpawnError { message: String },
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Shared state for every command job of one run
#[derive(Debug)]
pub struct CommandJob {
    pool: String,
    command: CommandSection,
    quiet: bool,
    stats: Mutex<RunMetricsAggregator>,
    stop_tx: watch::Sender<bool>,
}

impl CommandJob {
    pub fn new(
        pool: impl Into<String>,
        command: CommandSection,
        quiet: bool,
        stop_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            pool: pool.into(),
            command,
            quiet,
            stats: Mutex::new(RunMetricsAggregator::new()),
            stop_tx,
        }
    }

    /// Run the command for one input and record the outcome
    #[instrument(name = "command_job", skip(self), fields(program = %self.command.program))]
    pub async fn execute(&self, input: String) -> CommandOutcome {
        let started = Instant::now();
        let outcome = self.spawn_and_wait(&input).await;
        let elapsed = started.elapsed();

        match &outcome {
            CommandOutcome::Success => {
                debug!(elapsed_ms = elapsed.as_millis() as u64, "Command succeeded")
            }
            CommandOutcome::Failed { code } => {
                warn!(?code, elapsed_ms = elapsed.as_millis() as u64, "Command failed")
            }
            CommandOutcome::SpawnError { message } => {
                warn!(error = %message, "Command could not be started")
            }
        }

        self.record(elapsed, outcome.is_success());

        if !outcome.is_success() && self.command.fail_fast && !*self.stop_tx.borrow() {
            warn!("fail_fast: no further inputs will be dispatched");
            self.stop_tx.send_replace(true);
        }

        outcome
    }

    /// Snapshot of the statistics gathered so far
    pub fn stats(&self) -> RunMetricsAggregator {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn spawn_and_wait(&self, input: &str) -> CommandOutcome {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(self.command.render_args(input))
            .stdin(Stdio::null());
        if self.quiet {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        match cmd.status().await {
            Ok(status) if status.success() => CommandOutcome::Success,
            Ok(status) => CommandOutcome::Failed {
                code: status.code(),
            },
            Err(e) => CommandOutcome::SpawnError {
                message: e.to_string(),
            },
        }
    }

    fn record(&self, elapsed: Duration, success: bool) {
        record_job_finished(&self.pool, elapsed, success);
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(elapsed, success);
    }
}
