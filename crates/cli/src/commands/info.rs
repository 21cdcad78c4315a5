//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::PoolBlueprint;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    pool: PoolInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<CommandInfo>,
    observability: ObservabilityInfo,
}

#[derive(Serialize)]
struct PoolInfo {
    name: String,
    capacity: usize,
    input_buffer: usize,
}

#[derive(Serialize)]
struct CommandInfo {
    program: String,
    args: Vec<String>,
    fail_fast: bool,
}

#[derive(Serialize)]
struct ObservabilityInfo {
    log_format: contracts::LogFormat,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&build_config_info(&blueprint))
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &PoolBlueprint) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        pool: PoolInfo {
            name: blueprint.pool.name.clone(),
            capacity: blueprint.pool.capacity,
            input_buffer: blueprint.pool.input_buffer,
        },
        command: blueprint.command.as_ref().map(|c| CommandInfo {
            program: c.program.clone(),
            args: c.args.clone(),
            fail_fast: c.fail_fast,
        }),
        observability: ObservabilityInfo {
            log_format: blueprint.observability.log_format,
            log_level: blueprint.observability.log_level.clone(),
            metrics_port: (blueprint.observability.metrics_port != 0)
                .then_some(blueprint.observability.metrics_port),
        },
    }
}

fn print_config_info(blueprint: &PoolBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Job Pool Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Pool");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Name: {}", blueprint.pool.name);
    println!("   ├─ Capacity: {}", blueprint.pool.capacity);
    println!("   └─ Input buffer: {}", blueprint.pool.input_buffer);

    match &blueprint.command {
        Some(command) => {
            println!("\n▶ Command");
            println!("   ├─ Program: {}", command.program);
            println!("   ├─ Args: {:?}", command.args);
            println!("   └─ Fail fast: {}", command.fail_fast);
        }
        None => println!("\n▶ Command: (from command line)"),
    }

    let obs = &blueprint.observability;
    println!("\n📊 Observability");
    println!("   ├─ Log format: {:?}", obs.log_format);
    println!("   ├─ Log level: {}", obs.log_level);
    if obs.metrics_port == 0 {
        println!("   └─ Metrics: disabled");
    } else {
        println!("   └─ Metrics: :{}", obs.metrics_port);
    }

    println!();
}
