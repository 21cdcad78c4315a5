//! Dispatcher - intake loop and completion barrier

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{JobEvent, PoolSection};

use crate::callback::{Callback, CallbackRegistry};
use crate::error::DispatcherError;
use crate::metrics::{DispatcherMetrics, MetricsSnapshot};
use crate::slot::{JobFn, JobFuture, JobSlot};
use crate::source::JobSource;
use crate::state::{CompletionTracker, DispatcherState};

const DEFAULT_POOL_NAME: &str = "default";

/// Builder for creating a Dispatcher
#[derive(Debug)]
pub struct DispatcherBuilder {
    name: String,
    capacity: usize,
    callbacks: Vec<Callback>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder with the given concurrency cap
    pub fn new(capacity: usize) -> Self {
        Self {
            name: DEFAULT_POOL_NAME.to_string(),
            capacity,
            callbacks: Vec::new(),
        }
    }

    /// Create a builder from the `[pool]` configuration section
    pub fn from_section(section: &PoolSection) -> Self {
        Self::new(section.capacity).name(&section.name)
    }

    /// Pool name (used in logs)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a callback
    pub fn callback(mut self, callback: Callback) -> Self {
        self.callbacks.push(callback);
        self
    }

    /// Add several callbacks, keeping their order
    pub fn callbacks(mut self, callbacks: impl IntoIterator<Item = Callback>) -> Self {
        self.callbacks.extend(callbacks);
        self
    }

    /// Add a Start callback
    pub fn on_start<F>(self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callback(Callback::on_start(action))
    }

    /// Add an End callback
    pub fn on_end<F>(self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callback(Callback::on_end(action))
    }

    /// Build a dispatcher running an async job function
    pub fn build<T, F, Fut>(self, job: F) -> Result<Dispatcher<T>, DispatcherError>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job: JobFn<T> = Arc::new(move |input: T| -> JobFuture { Box::pin(job(input)) });
        self.build_erased(job)
    }

    /// Build a dispatcher running a blocking job function
    ///
    /// Each job runs on tokio's blocking pool; the concurrency cap still
    /// applies. A panic inside the job is propagated to the job task.
    pub fn build_blocking<T, F>(self, job: F) -> Result<Dispatcher<T>, DispatcherError>
    where
        T: Send + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        self.build(move |input: T| {
            let job = Arc::clone(&job);
            async move {
                if let Err(e) = tokio::task::spawn_blocking(move || job(input)).await {
                    if e.is_panic() {
                        std::panic::resume_unwind(e.into_panic());
                    }
                }
            }
        })
    }

    #[instrument(
        name = "dispatcher_builder_build",
        skip(self, job),
        fields(pool = %self.name, capacity = self.capacity, callbacks = self.callbacks.len())
    )]
    fn build_erased<T>(self, job: JobFn<T>) -> Result<Dispatcher<T>, DispatcherError> {
        if self.capacity == 0 || self.capacity > Semaphore::MAX_PERMITS {
            return Err(DispatcherError::invalid_capacity(self.capacity));
        }

        debug!("Dispatcher created");

        Ok(Dispatcher {
            shared: Arc::new(Shared {
                slots: Arc::new(Semaphore::new(self.capacity)),
                callbacks: CallbackRegistry::new(self.callbacks),
                tracker: Arc::new(CompletionTracker::new(self.name.clone())),
                name: self.name,
                capacity: self.capacity,
                job,
            }),
        })
    }
}

/// Closes intake when `work` returns or its future is dropped
struct IntakeGuard<'a> {
    tracker: &'a CompletionTracker,
    /// An input was counted as submitted but its job is not spawned yet
    undispatched: bool,
}

impl Drop for IntakeGuard<'_> {
    fn drop(&mut self) {
        if self.undispatched {
            warn!("Intake stopped before the pending input was dispatched, dropping it");
            self.tracker.job_finished();
        }
        self.tracker.close_intake();
    }
}

struct Shared<T> {
    name: String,
    capacity: usize,
    slots: Arc<Semaphore>,
    job: JobFn<T>,
    callbacks: CallbackRegistry,
    tracker: Arc<CompletionTracker>,
}

/// Bounded-concurrency job dispatcher
///
/// Cloning is cheap and yields another handle to the same pool, so the
/// intake loop and the barrier can run on different tasks.
pub struct Dispatcher<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.shared.name)
            .field("capacity", &self.shared.capacity)
            .field("state", &self.state())
            .field("metrics", &self.metrics())
            .finish()
    }
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Create a dispatcher running an async job function
    ///
    /// # Errors
    /// `InvalidCapacity` if `capacity` is zero.
    pub fn new<F, Fut>(
        capacity: usize,
        job: F,
        callbacks: impl IntoIterator<Item = Callback>,
    ) -> Result<Self, DispatcherError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        DispatcherBuilder::new(capacity)
            .callbacks(callbacks)
            .build(job)
    }

    /// Create a dispatcher running a blocking job function
    ///
    /// # Errors
    /// `InvalidCapacity` if `capacity` is zero.
    pub fn new_blocking<F>(
        capacity: usize,
        job: F,
        callbacks: impl IntoIterator<Item = Callback>,
    ) -> Result<Self, DispatcherError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        DispatcherBuilder::new(capacity)
            .callbacks(callbacks)
            .build_blocking(job)
    }

    /// Run the intake loop
    ///
    /// Consumes inputs until the source closes. For each input: count it as
    /// submitted, wait for a free slot, fire the Start callbacks, then spawn
    /// the job. Returns as soon as the source closes; in-flight jobs keep
    /// running (use [`Dispatcher::wait`] for those).
    ///
    /// # Cancellation
    /// Dropping the returned future closes intake just like the source
    /// ending: jobs already spawned run to completion and [`Dispatcher::wait`]
    /// still resolves. An input taken from the source while waiting for a
    /// slot is discarded; it counts as completed but its job never runs and
    /// no callbacks fire for it. Inputs left in the source are not consumed.
    ///
    /// # Errors
    /// `AlreadyStarted` if this dispatcher already consumed a source.
    #[instrument(
        name = "dispatcher_work",
        skip(self, source),
        fields(pool = %self.shared.name, capacity = self.shared.capacity)
    )]
    pub async fn work<S>(&self, mut source: S) -> Result<(), DispatcherError>
    where
        S: JobSource<T>,
    {
        let shared = &self.shared;
        shared.tracker.begin()?;
        let mut intake = IntakeGuard {
            tracker: &shared.tracker,
            undispatched: false,
        };
        info!("Dispatcher started");

        while let Some(input) = source.next_input().await {
            let job_id = shared.tracker.metrics().inc_submitted();
            intake.undispatched = true;

            let permit = Arc::clone(&shared.slots)
                .acquire_owned()
                .await
                .expect("dispatcher semaphore is never closed");

            let callbacks = shared.callbacks.snapshot();
            callbacks.fire(JobEvent::Start);

            JobSlot::new(job_id, permit, callbacks, Arc::clone(&shared.tracker)).spawn(
                &shared.name,
                &shared.job,
                input,
            );
            intake.undispatched = false;

            if job_id % 100 == 0 {
                debug!(submitted = job_id, "Dispatcher progress");
            }
        }

        let metrics = shared.tracker.metrics();
        info!(
            submitted = metrics.submitted(),
            completed = metrics.completed(),
            "Dispatcher input closed"
        );

        Ok(())
    }

    /// Spawn the intake loop as a background task
    pub fn spawn<S>(&self, source: S) -> JoinHandle<Result<(), DispatcherError>>
    where
        S: JobSource<T> + Send + 'static,
    {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.work(source).await })
    }
}

impl<T> Dispatcher<T> {
    /// Wait until the source has closed and every submitted job completed
    ///
    /// Resolves immediately if that already happened. There is no timeout;
    /// wrap in `tokio::time::timeout` if one is needed.
    pub async fn wait(&self) {
        self.shared.tracker.wait_done().await;
    }

    /// Register a callback
    ///
    /// May be called at any time. Jobs already dispatched keep the callback
    /// list they were dispatched with; the new callback applies to every job
    /// dispatched afterwards.
    pub fn register_callback(&self, callback: Callback) {
        debug!(pool = %self.shared.name, event = %callback.event(), "Callback registered");
        self.shared.callbacks.register(callback);
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Concurrency cap
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Current lifecycle state
    pub fn state(&self) -> DispatcherState {
        self.shared.tracker.state()
    }

    /// Inputs consumed so far
    pub fn submitted(&self) -> u64 {
        self.shared.tracker.metrics().submitted()
    }

    /// Jobs completed so far
    pub fn completed(&self) -> u64 {
        self.shared.tracker.metrics().completed()
    }

    /// Jobs currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.shared.tracker.metrics().in_flight()
    }

    /// Live metrics handle
    pub fn metrics_handle(&self) -> &Arc<DispatcherMetrics> {
        self.shared.tracker.metrics()
    }

    /// Get current metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.tracker.metrics().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IterSource;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout, Duration};

    fn counter() -> Arc<AtomicU64> {
        Arc::new(AtomicU64::new(0))
    }

    fn counting(c: &Arc<AtomicU64>) -> impl Fn() + Send + Sync + 'static {
        let c = Arc::clone(c);
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let result = Dispatcher::new(0, |_: u32| async {}, []);
        assert!(matches!(
            result,
            Err(DispatcherError::InvalidCapacity { capacity: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_callback_counts() {
        let runs = counter();
        let starts = counter();
        let ends = counter();

        let job_runs = Arc::clone(&runs);
        let pool = Dispatcher::new(
            10,
            move |_: ()| {
                let runs = Arc::clone(&job_runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            [Callback::on_start(counting(&starts)), Callback::on_end(counting(&ends))],
        )
        .unwrap();
        pool.register_callback(Callback::on_end(counting(&ends)));

        let (tx, rx) = mpsc::channel(1);
        let intake = pool.spawn(rx);
        for _ in 0..10 {
            tx.send(()).await.unwrap();
        }
        drop(tx);

        pool.wait().await;
        intake.await.unwrap().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 10);
        assert_eq!(starts.load(Ordering::SeqCst), 10);
        assert_eq!(ends.load(Ordering::SeqCst), 20);
        assert_eq!(pool.state(), DispatcherState::Done);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_for_empty_source() {
        let pool = Dispatcher::new(2, |_: u32| async {}, []).unwrap();
        pool.work(IterSource::new(Vec::<u32>::new())).await.unwrap();

        timeout(Duration::from_millis(100), pool.wait())
            .await
            .expect("wait should not block on an empty source");
        assert_eq!(pool.submitted(), 0);
        assert_eq!(pool.state(), DispatcherState::Done);
    }

    #[tokio::test]
    async fn test_wait_blocks_until_source_closed() {
        let pool = Dispatcher::new(2, |_: u32| async {}, []).unwrap();
        let (tx, rx) = mpsc::channel(4);
        let intake = pool.spawn(rx);

        tx.send(1).await.unwrap();
        assert!(timeout(Duration::from_millis(50), pool.wait())
            .await
            .is_err());

        drop(tx);
        pool.wait().await;
        intake.await.unwrap().unwrap();
        assert_eq!(pool.completed(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_capped() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (job_running, job_peak) = (Arc::clone(&running), Arc::clone(&peak));
        let pool = Dispatcher::new(
            3,
            move |_: u32| {
                let running = Arc::clone(&job_running);
                let peak = Arc::clone(&job_peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }
            },
            [],
        )
        .unwrap();

        pool.work(IterSource::new(0..20)).await.unwrap();
        pool.wait().await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(pool.metrics().peak_in_flight <= 3);
        assert_eq!(pool.metrics().completed, 20);
    }

    #[tokio::test]
    async fn test_second_work_rejected() {
        let pool = Dispatcher::new(1, |_: u32| async {}, []).unwrap();
        pool.work(IterSource::new([1])).await.unwrap();
        pool.wait().await;

        let err = pool.work(IterSource::new([2])).await.unwrap_err();
        assert_eq!(
            err,
            DispatcherError::AlreadyStarted {
                state: DispatcherState::Done
            }
        );
        assert_eq!(pool.submitted(), 1);
    }

    #[tokio::test]
    async fn test_start_fires_before_job_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let job_log = Arc::clone(&log);
        let pool = DispatcherBuilder::new(1)
            .name("ordered")
            .build(move |n: u32| {
                let log = Arc::clone(&job_log);
                async move {
                    log.lock().unwrap().push(format!("run {n}"));
                }
            })
            .unwrap();
        let start_log = Arc::clone(&log);
        pool.register_callback(Callback::on_start(move || {
            start_log.lock().unwrap().push("start".to_string())
        }));
        let end_log = Arc::clone(&log);
        pool.register_callback(Callback::on_end(move || {
            end_log.lock().unwrap().push("end".to_string())
        }));

        pool.work(IterSource::new([1, 2])).await.unwrap();
        pool.wait().await;

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec!["start", "run 1", "end", "start", "run 2", "end"]
        );
    }

    #[tokio::test]
    async fn test_cancelled_work_still_drains() {
        let runs = counter();
        let job_runs = Arc::clone(&runs);
        let pool = Dispatcher::new(
            1,
            move |_: u32| {
                let runs = Arc::clone(&job_runs);
                async move {
                    sleep(Duration::from_millis(200)).await;
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            },
            [],
        )
        .unwrap();

        let (tx, rx) = mpsc::channel(4);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();

        // The second input waits for the only slot when the timeout fires.
        assert!(timeout(Duration::from_millis(50), pool.work(rx))
            .await
            .is_err());

        timeout(Duration::from_secs(2), pool.wait())
            .await
            .expect("wait must resolve after intake is cancelled");

        assert_eq!(pool.state(), DispatcherState::Done);
        assert_eq!(pool.submitted(), 2);
        assert_eq!(pool.completed(), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(matches!(
            pool.work(IterSource::new([3])).await,
            Err(DispatcherError::AlreadyStarted { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_callback_panic_still_drains() {
        let starts = counter();
        let seen = Arc::clone(&starts);
        let pool = Dispatcher::new(
            1,
            |_: u32| async {},
            [Callback::on_start(move || {
                if seen.fetch_add(1, Ordering::SeqCst) == 1 {
                    panic!("start callback failure");
                }
            })],
        )
        .unwrap();

        let intake = pool.spawn(IterSource::new([0, 1, 2]));
        assert!(intake.await.is_err());

        timeout(Duration::from_secs(2), pool.wait())
            .await
            .expect("wait must resolve after the intake task panicked");
        assert_eq!(pool.submitted(), 2);
        assert_eq!(pool.completed(), 2);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panicking_job_releases_slot() {
        let ends = counter();
        let pool = Dispatcher::new(
            1,
            |n: u32| async move {
                if n == 0 {
                    panic!("job failure");
                }
            },
            [Callback::on_end(counting(&ends))],
        )
        .unwrap();

        pool.work(IterSource::new([0, 1, 2])).await.unwrap();
        timeout(Duration::from_secs(5), pool.wait())
            .await
            .expect("barrier must not hang on a panicking job");

        let metrics = pool.metrics();
        assert_eq!(metrics.completed, 3);
        assert_eq!(metrics.panicked, 1);
        assert_eq!(metrics.in_flight, 0);
        assert_eq!(ends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_jobs() {
        let sum = counter();
        let job_sum = Arc::clone(&sum);
        let pool = Dispatcher::new_blocking(
            2,
            move |n: u64| {
                std::thread::sleep(std::time::Duration::from_millis(5));
                job_sum.fetch_add(n, Ordering::SeqCst);
            },
            [],
        )
        .unwrap();

        pool.work(IterSource::new(1..=10)).await.unwrap();
        pool.wait().await;

        assert_eq!(sum.load(Ordering::SeqCst), 55);
        assert!(pool.metrics().peak_in_flight <= 2);
    }

    #[tokio::test]
    async fn test_from_section() {
        let section = PoolSection {
            name: "configured".into(),
            capacity: 3,
            input_buffer: 8,
        };
        let pool = DispatcherBuilder::from_section(&section)
            .build(|_: u32| async {})
            .unwrap();
        assert_eq!(pool.name(), "configured");
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.state(), DispatcherState::Idle);
    }
}
