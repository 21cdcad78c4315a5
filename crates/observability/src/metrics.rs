//! Job pool metrics
//!
//! Recorders for the `metrics` facade (exported by Prometheus when enabled)
//! plus an in-memory aggregator used for end-of-run summaries.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use metrics::{counter, gauge, histogram};

/// Record a job start
///
/// Meant to be called from a Start callback.
pub fn record_job_started(pool: &str) {
    counter!("jobpool_jobs_started_total", "pool" => pool.to_string()).increment(1);
}

/// Record a finished job with its duration and outcome
pub fn record_job_finished(pool: &str, duration: Duration, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "jobpool_jobs_finished_total",
        "pool" => pool.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("jobpool_job_duration_ms", "pool" => pool.to_string())
        .record(duration.as_secs_f64() * 1000.0);
}

/// Publish dispatcher counters as gauges
pub fn record_dispatcher_snapshot(pool: &str, snapshot: &MetricsSnapshot) {
    gauge!("jobpool_submitted", "pool" => pool.to_string()).set(snapshot.submitted as f64);
    gauge!("jobpool_completed", "pool" => pool.to_string()).set(snapshot.completed as f64);
    gauge!("jobpool_in_flight", "pool" => pool.to_string()).set(snapshot.in_flight as f64);
    gauge!("jobpool_peak_in_flight", "pool" => pool.to_string())
        .set(snapshot.peak_in_flight as f64);
    gauge!("jobpool_panicked", "pool" => pool.to_string()).set(snapshot.panicked as f64);
}

/// Run statistics aggregator
///
/// Collects per-job outcomes in memory for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct RunMetricsAggregator {
    /// Jobs that succeeded
    pub succeeded: u64,

    /// Jobs that failed
    pub failed: u64,

    /// Job duration statistics (milliseconds)
    pub duration_stats: RunningStats,
}

impl RunMetricsAggregator {
    /// Create new aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one job outcome
    pub fn update(&mut self, duration: Duration, success: bool) {
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.duration_stats.push(duration.as_secs_f64() * 1000.0);
    }

    /// Generate summary report
    pub fn summary(&self, elapsed: Duration, dispatcher: MetricsSnapshot) -> RunSummary {
        let total = self.succeeded + self.failed;
        let secs = elapsed.as_secs_f64();
        RunSummary {
            submitted: dispatcher.submitted,
            completed: dispatcher.completed,
            succeeded: self.succeeded,
            failed: self.failed,
            panicked: dispatcher.panicked,
            peak_in_flight: dispatcher.peak_in_flight,
            failure_rate: if total > 0 {
                self.failed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            jobs_per_sec: if secs > 0.0 { total as f64 / secs } else { 0.0 },
            elapsed,
            duration_ms: StatsSummary::from(&self.duration_stats),
            dispatcher,
        }
    }

}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub submitted: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
    pub peak_in_flight: usize,
    pub failure_rate: f64,
    pub jobs_per_sec: f64,
    pub elapsed: Duration,
    pub duration_ms: StatsSummary,
    /// Dispatcher counters at the end of the run
    pub dispatcher: MetricsSnapshot,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Job Pool Summary ===")?;
        writeln!(f, "Submitted: {}", self.submitted)?;
        writeln!(f, "Completed: {}", self.completed)?;
        writeln!(f, "Succeeded: {}", self.succeeded)?;
        writeln!(f, "Failed: {} ({:.2}%)", self.failed, self.failure_rate)?;
        if self.panicked > 0 {
            writeln!(f, "Panicked: {}", self.panicked)?;
        }
        writeln!(f, "Peak concurrency: {}", self.peak_in_flight)?;
        writeln!(
            f,
            "Elapsed: {:.2}s ({:.2} jobs/s)",
            self.elapsed.as_secs_f64(),
            self.jobs_per_sec
        )?;
        writeln!(f, "Job duration (ms): {}", self.duration_ms)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
