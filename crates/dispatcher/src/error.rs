//! Dispatcher error types

use thiserror::Error;

use crate::state::DispatcherState;

/// Dispatcher-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatcherError {
    /// Capacity of zero (or beyond what the slot semaphore can hold)
    #[error("invalid capacity {capacity}: must be between 1 and {max}")]
    InvalidCapacity { capacity: usize, max: usize },

    /// `work` was called on a dispatcher that already consumed a source
    #[error("dispatcher already started (state: {state})")]
    AlreadyStarted { state: DispatcherState },
}

impl DispatcherError {
    /// Create an invalid capacity error
    pub fn invalid_capacity(capacity: usize) -> Self {
        Self::InvalidCapacity {
            capacity,
            max: tokio::sync::Semaphore::MAX_PERMITS,
        }
    }
}
