//! # Dispatcher
//!
//! Bounded-concurrency job dispatcher.
//!
//! Responsibilities:
//! - Consume inputs from a `JobSource` and run a job function on each
//! - Cap the number of in-flight jobs (back-pressure on the intake loop)
//! - Fire Start/End lifecycle callbacks
//! - Offer a barrier (`wait`) that resolves once every submitted job finished
//!
//! ## Example
//!
//! ```no_run
//! use dispatcher::{Callback, Dispatcher, IterSource};
//!
//! # async fn demo() -> Result<(), dispatcher::DispatcherError> {
//! let pool = Dispatcher::new(
//!     4,
//!     |n: u32| async move { println!("job {n}") },
//!     [Callback::on_end(|| println!("job finished"))],
//! )?;
//!
//! let intake = pool.spawn(IterSource::new(0..10));
//! pool.wait().await;
//! let _ = intake.await;
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod slot;
pub mod source;
pub mod state;

pub use callback::{Callback, CallbackAction};
pub use contracts::JobEvent;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::DispatcherError;
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use slot::JobFuture;
pub use source::{IterSource, JobSource, LocalJobSource};
pub use state::DispatcherState;
