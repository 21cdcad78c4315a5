//! JobSlot - one admitted job and the slot it holds
//!
//! The slot is released, and the job counted as completed, when the
//! `SlotGuard` is dropped. That happens on the normal path after the End
//! callbacks, and also when the job task unwinds from a panic, so a failing
//! job can never leak its slot or stall the barrier.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, Instrument};

use contracts::JobEvent;

use crate::callback::CallbackSet;
use crate::state::CompletionTracker;

/// Boxed future returned by a job function
pub type JobFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'static>>;

/// Type-erased job function
pub(crate) type JobFn<T> = Arc<dyn Fn(T) -> JobFuture + Send + Sync>;

/// A job that has been admitted (slot acquired, Start callbacks fired)
pub(crate) struct JobSlot {
    id: u64,
    permit: OwnedSemaphorePermit,
    callbacks: CallbackSet,
    tracker: Arc<CompletionTracker>,
}

impl JobSlot {
    pub(crate) fn new(
        id: u64,
        permit: OwnedSemaphorePermit,
        callbacks: CallbackSet,
        tracker: Arc<CompletionTracker>,
    ) -> Self {
        tracker.metrics().slot_acquired();
        Self {
            id,
            permit,
            callbacks,
            tracker,
        }
    }

    /// Run the job on its own task
    pub(crate) fn spawn<T>(self, pool: &str, job: &JobFn<T>, input: T) -> JoinHandle<()>
    where
        T: Send + 'static,
    {
        let span = info_span!("job", pool = %pool, job_id = self.id);
        let job = Arc::clone(job);
        let JobSlot {
            id,
            permit,
            callbacks,
            tracker,
        } = self;
        let guard = SlotGuard {
            id,
            permit: Some(permit),
            tracker,
            returned: false,
        };

        tokio::spawn(
            async move {
                let started = Instant::now();
                job(input).await;
                debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Job returned");

                callbacks.fire(JobEvent::End);
                guard.finish();
            }
            .instrument(span),
        )
    }
}

/// Releases the slot and records completion on drop
struct SlotGuard {
    id: u64,
    permit: Option<OwnedSemaphorePermit>,
    tracker: Arc<CompletionTracker>,
    returned: bool,
}

impl SlotGuard {
    fn finish(mut self) {
        self.returned = true;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.returned {
            self.tracker.metrics().inc_panicked();
            error!(
                job_id = self.id,
                "Job did not return normally; releasing slot without End callbacks"
            );
        }

        self.tracker.metrics().slot_released();
        drop(self.permit.take());
        self.tracker.job_finished();
    }
}
