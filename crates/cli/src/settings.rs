//! Effective configuration: file values with command-line overrides applied.

use std::path::Path;
use tracing::info;

use config_loader::ConfigLoader;
use contracts::{CommandSection, PoolBlueprint};

use crate::cli::RunArgs;
use crate::error::{CliError, Result};

/// Load a blueprint from `path`, or fall back to defaults when no path is given
pub fn load_blueprint(path: Option<&Path>) -> Result<PoolBlueprint> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()));
            }
            Ok(ConfigLoader::load_from_path(path)?)
        }
        None => Ok(PoolBlueprint::default()),
    }
}

/// Apply `run` overrides and re-validate
pub fn apply_run_overrides(blueprint: &mut PoolBlueprint, args: &RunArgs) -> Result<()> {
    if let Some(capacity) = args.capacity {
        info!(capacity, "Overriding pool capacity from CLI");
        blueprint.pool.capacity = capacity;
    }
    if let Some(input_buffer) = args.input_buffer {
        blueprint.pool.input_buffer = input_buffer;
    }
    if let Some(port) = args.metrics_port {
        blueprint.observability.metrics_port = port;
    }

    if let Some((program, rest)) = args.command.split_first() {
        info!(program = %program, "Using command from CLI");
        let fail_fast = blueprint.command.as_ref().is_some_and(|c| c.fail_fast);
        blueprint.command = Some(CommandSection {
            program: program.clone(),
            args: rest.to_vec(),
            fail_fast,
        });
    }

    match blueprint.command.as_mut() {
        Some(command) => command.fail_fast |= args.fail_fast,
        None => return Err(CliError::MissingCommand),
    }

    ConfigLoader::validate(blueprint)?;
    Ok(())
}
