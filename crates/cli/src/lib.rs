//! # jobpool CLI
//!
//! Library half of the `jobpool` binary: argument definitions, configuration
//! resolution and the command runner. `main.rs` only wires them together.

pub mod cli;
pub mod commands;
pub mod error;
pub mod runner;
pub mod settings;

pub use error::{CliError, Result};
pub use runner::{Runner, RunnerConfig};
