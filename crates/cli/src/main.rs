//! # jobpool
//!
//! Command-line entry point.
//!
//! Provides:
//! - Configuration loading and validation
//! - Bounded-concurrency command execution over input lines
//! - Graceful shutdown handling

use anyhow::Result;
use clap::Parser;
use tracing::info;

use jobpool_cli::cli::{Cli, Commands};
use jobpool_cli::commands::{run_info, run_pool, run_validate};
use observability::ObservabilityConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "jobpool starting");

    let result = match &cli.command {
        Commands::Run(args) => run_pool(args, cli.quiet).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging from the config file's observability section and CLI options
///
/// The config file is read leniently here; errors surface later when the
/// command loads it for real.
fn init_logging(cli: &Cli) -> Result<()> {
    let section = cli
        .config_path()
        .filter(|path| path.exists())
        .and_then(|path| config_loader::ConfigLoader::load_from_path(path).ok())
        .map(|blueprint| blueprint.observability)
        .unwrap_or_default();

    let mut config = ObservabilityConfig::from(&section);

    if let Some(format) = cli.log_format {
        config.log_format = format.into();
    }
    if cli.quiet {
        config.default_log_level = "warn".to_string();
    } else if cli.verbose > 0 {
        config.default_log_level = match cli.verbose {
            1 => "debug",
            _ => "trace",
        }
        .to_string();
    }
    if let Commands::Run(args) = &cli.command {
        if let Some(port) = args.metrics_port {
            config.metrics_port = (port != 0).then_some(port);
        }
    }

    observability::init_with_config(config)
}
