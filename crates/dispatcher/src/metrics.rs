//! Dispatcher counters
//!
//! `submitted` and `completed` double as the bookkeeping the barrier relies
//! on, so they use `SeqCst`; the remaining gauges are informational.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Live counters for one dispatcher
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Inputs taken from the source
    submitted: AtomicU64,
    /// Jobs whose slot has been released
    completed: AtomicU64,
    /// Jobs currently holding a slot
    in_flight: AtomicUsize,
    /// Highest `in_flight` observed
    peak_in_flight: AtomicUsize,
    /// Jobs that did not return normally (panicked or were dropped)
    panicked: AtomicU64,
}

impl DispatcherMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get submitted count
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Increment submitted count, returning the new value (doubles as job id)
    pub(crate) fn inc_submitted(&self) -> u64 {
        self.submitted.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Get completed count
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub(crate) fn inc_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// True when every submitted job has completed
    pub fn is_drained(&self) -> bool {
        self.submitted() == self.completed()
    }

    /// Get current number of jobs holding a slot
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Get highest concurrency observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub(crate) fn slot_acquired(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::Relaxed);
    }

    pub(crate) fn slot_released(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get panicked count
    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted(),
            completed: self.completed(),
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
            panicked: self.panicked(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub panicked: u64,
}
