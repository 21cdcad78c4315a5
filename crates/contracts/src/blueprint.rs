//! PoolBlueprint - Config Loader output
//!
//! Describes a complete job pool run: pool sizing, the command executed per
//! input, and logging/metrics settings.

use serde::{Deserialize, Serialize};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pool configuration blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Pool sizing
    #[serde(default)]
    pub pool: PoolSection,

    /// Command executed for every input (may also come from the command line)
    #[serde(default)]
    pub command: Option<CommandSection>,

    /// Logging and metrics
    #[serde(default)]
    pub observability: ObservabilitySection,
}

/// Pool sizing: concurrency cap and intake buffering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSection {
    /// Pool name (used in logs)
    #[serde(default = "default_pool_name")]
    pub name: String,

    /// Maximum number of jobs in flight
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Size of the channel between the input reader and the intake loop
    #[serde(default = "default_input_buffer")]
    pub input_buffer: usize,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            name: default_pool_name(),
            capacity: default_capacity(),
            input_buffer: default_input_buffer(),
        }
    }
}

fn default_pool_name() -> String {
    "default".to_string()
}

fn default_capacity() -> usize {
    4
}

fn default_input_buffer() -> usize {
    64
}

/// Placeholder replaced by the input value in command arguments
pub const INPUT_PLACEHOLDER: &str = "{}";

/// External command run once per input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSection {
    /// Program to execute
    pub program: String,

    /// Arguments; `{}` is replaced by the input, which is appended when no
    /// argument contains the placeholder
    #[serde(default)]
    pub args: Vec<String>,

    /// Stop reading new inputs after the first failed command
    #[serde(default)]
    pub fail_fast: bool,
}

impl CommandSection {
    /// Build the argument list for one input
    pub fn render_args(&self, input: &str) -> Vec<String> {
        if self.args.iter().any(|a| a.contains(INPUT_PLACEHOLDER)) {
            self.args
                .iter()
                .map(|a| a.replace(INPUT_PLACEHOLDER, input))
                .collect()
        } else {
            let mut args = self.args.clone();
            args.push(input.to_string());
            args
        }
    }
}

/// Logging and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySection {
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Default log level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus exporter port (0 = disabled)
    #[serde(default)]
    pub metrics_port: u16,
}

impl Default for ObservabilitySection {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            metrics_port: 0,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable multi-line format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
