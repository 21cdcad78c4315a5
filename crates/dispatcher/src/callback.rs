//! Lifecycle callbacks
//!
//! Callbacks are stored copy-on-write: registration swaps in a new list,
//! and every dispatched job holds the snapshot taken at its dispatch, so a
//! job's Start and End callbacks always come from the same list.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use contracts::JobEvent;

/// Callback action type
///
/// Uses `Arc` so a snapshot can be shared by the intake task and job tasks.
pub type CallbackAction = Arc<dyn Fn() + Send + Sync>;

/// An action bound to a job lifecycle event
#[derive(Clone)]
pub struct Callback {
    event: JobEvent,
    action: CallbackAction,
}

impl Callback {
    /// Create a callback for the given event
    pub fn new<F>(event: JobEvent, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            event,
            action: Arc::new(action),
        }
    }

    /// Callback fired before each job starts
    pub fn on_start<F>(action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(JobEvent::Start, action)
    }

    /// Callback fired after each job returns
    pub fn on_end<F>(action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(JobEvent::End, action)
    }

    /// Event this callback is bound to
    pub fn event(&self) -> JobEvent {
        self.event
    }

    fn invoke(&self) {
        (self.action)()
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Immutable, ordered view of the registered callbacks
#[derive(Debug, Clone, Default)]
pub(crate) struct CallbackSet {
    callbacks: Arc<Vec<Callback>>,
}

impl CallbackSet {
    /// Run every callback bound to `event`, in registration order
    pub(crate) fn fire(&self, event: JobEvent) {
        for callback in self.callbacks.iter().filter(|c| c.event == event) {
            callback.invoke();
        }
    }

    #[cfg(test)]
    pub(crate) fn count(&self, event: JobEvent) -> usize {
        self.callbacks.iter().filter(|c| c.event == event).count()
    }
}

/// Thread-safe callback registry
#[derive(Debug, Default)]
pub(crate) struct CallbackRegistry {
    current: RwLock<CallbackSet>,
}

impl CallbackRegistry {
    pub(crate) fn new(initial: Vec<Callback>) -> Self {
        Self {
            current: RwLock::new(CallbackSet {
                callbacks: Arc::new(initial),
            }),
        }
    }

    /// Append a callback; visible to jobs dispatched afterwards
    pub(crate) fn register(&self, callback: Callback) {
        // Callbacks never run under this lock, so a poisoned lock still holds a valid list.
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut current.callbacks).push(callback);
    }

    /// Snapshot of the current list
    pub(crate) fn snapshot(&self) -> CallbackSet {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
