//! Dispatcher lifecycle state and completion tracking
//!
//! ```text
//! Idle --work()--> Running --source ends--> Draining --last job--> Done
//!                          \--source ends, nothing in flight-----> Done
//! ```
//!
//! Every transition goes through `watch::Sender::send_if_modified`, which
//! serializes them. The intake path (source end) and the job path (last
//! completion) both re-check the counters under that lock, so exactly one
//! of them performs `Draining -> Done`.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::DispatcherError;
use crate::metrics::DispatcherMetrics;

/// Lifecycle state of a dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatcherState {
    /// Constructed, intake not started
    Idle,
    /// Intake loop consuming the source
    Running,
    /// Source ended, jobs may still be in flight
    Draining,
    /// Source ended and every submitted job completed
    Done,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Shared completion bookkeeping (counters + state channel)
#[derive(Debug)]
pub(crate) struct CompletionTracker {
    pool: String,
    metrics: Arc<DispatcherMetrics>,
    state_tx: watch::Sender<DispatcherState>,
}

impl CompletionTracker {
    pub(crate) fn new(pool: String) -> Self {
        let (state_tx, _) = watch::channel(DispatcherState::Idle);
        Self {
            pool,
            metrics: Arc::new(DispatcherMetrics::new()),
            state_tx,
        }
    }

    pub(crate) fn metrics(&self) -> &Arc<DispatcherMetrics> {
        &self.metrics
    }

    pub(crate) fn state(&self) -> DispatcherState {
        *self.state_tx.borrow()
    }

    /// Idle -> Running; any other starting state is rejected
    pub(crate) fn begin(&self) -> Result<(), DispatcherError> {
        let mut observed = DispatcherState::Idle;
        let started = self.state_tx.send_if_modified(|state| {
            observed = *state;
            if *state == DispatcherState::Idle {
                *state = DispatcherState::Running;
                true
            } else {
                false
            }
        });

        if started {
            Ok(())
        } else {
            Err(DispatcherError::AlreadyStarted { state: observed })
        }
    }

    /// Running -> Draining, or straight to Done when nothing is in flight
    pub(crate) fn close_intake(&self) {
        self.state_tx.send_if_modified(|state| {
            *state = if self.metrics.is_drained() {
                DispatcherState::Done
            } else {
                DispatcherState::Draining
            };
            true
        });

        match self.state() {
            DispatcherState::Done => info!(
                pool = %self.pool,
                submitted = self.metrics.submitted(),
                "Input closed with no jobs in flight, dispatcher done"
            ),
            state => debug!(
                pool = %self.pool,
                %state,
                in_flight = self.metrics.in_flight(),
                "Input closed, draining"
            ),
        }
    }

    /// Count one job as completed; performs Draining -> Done for the last one
    pub(crate) fn job_finished(&self) {
        self.metrics.inc_completed();

        let finished = self.state_tx.send_if_modified(|state| {
            if *state == DispatcherState::Draining && self.metrics.is_drained() {
                *state = DispatcherState::Done;
                true
            } else {
                false
            }
        });

        if finished {
            info!(
                pool = %self.pool,
                completed = self.metrics.completed(),
                peak_in_flight = self.metrics.peak_in_flight(),
                "All jobs completed, dispatcher done"
            );
        }
    }

    /// Resolve once the state reaches Done
    pub(crate) async fn wait_done(&self) {
        let mut state_rx = self.state_tx.subscribe();
        // The sender is owned by `self`, so the channel stays open for the whole wait.
        if state_rx
            .wait_for(|state| *state == DispatcherState::Done)
            .await
            .is_err()
        {
            debug!(pool = %self.pool, "State channel closed while waiting");
        }
    }
}
