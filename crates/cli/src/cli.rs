//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// jobpool - run a command once per input line with bounded concurrency
#[derive(Parser, Debug)]
#[command(
    name = "jobpool",
    author,
    version,
    about = "Bounded-concurrency parallel command runner",
    long_about = "Reads one input per line and runs a command for each of them, \n\
                  never running more than `capacity` commands at once.\n\n\
                  Arguments equal to or containing `{}` are replaced by the input; \n\
                  without a placeholder the input is appended as the last argument."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "JOBPOOL_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (overrides the configuration file)
    #[arg(long, value_enum, global = true, env = "JOBPOOL_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Configuration file referenced by the selected command, if any
    pub fn config_path(&self) -> Option<&PathBuf> {
        match &self.command {
            Commands::Run(args) => args.config.as_ref(),
            Commands::Validate(args) => Some(&args.config),
            Commands::Info(args) => Some(&args.config),
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command for every input line
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "JOBPOOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Read inputs from this file instead of stdin ("-" = stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Override the maximum number of concurrent commands
    #[arg(short = 'j', long, env = "JOBPOOL_CAPACITY")]
    pub capacity: Option<usize>,

    /// Override the input channel buffer size
    #[arg(long, env = "JOBPOOL_INPUT_BUFFER")]
    pub input_buffer: Option<usize>,

    /// Stop reading new inputs after the first failed command
    #[arg(long)]
    pub fail_fast: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, env = "JOBPOOL_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Command to run (overrides the configuration file), after `--`
    #[arg(last = true)]
    pub command: Vec<String>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pool.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pool.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for contracts::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
