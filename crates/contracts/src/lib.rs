//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate, never the other way round.
//!
//! ## Contents
//! - `JobEvent`: lifecycle tags for dispatcher callbacks
//! - `PoolBlueprint`: the configuration schema produced by `config_loader`
//! - `ContractError`: configuration-level errors

mod blueprint;
mod error;
mod event;

pub use blueprint::*;
pub use error::*;
pub use event::JobEvent;
