//! Configuration validation
//!
//! Rules:
//! - pool.capacity > 0
//! - pool.input_buffer > 0
//! - pool.name not empty
//! - command.program not empty (when a command is configured)
//! - observability.log_level is a known level

use contracts::{ContractError, PoolBlueprint};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a PoolBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &PoolBlueprint) -> Result<(), ContractError> {
    validate_pool(blueprint)?;
    validate_command(blueprint)?;
    validate_observability(blueprint)?;
    Ok(())
}

/// Validate pool sizing
fn validate_pool(blueprint: &PoolBlueprint) -> Result<(), ContractError> {
    let pool = &blueprint.pool;

    if pool.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "pool.name",
            "pool name cannot be empty",
        ));
    }

    if pool.capacity == 0 {
        return Err(ContractError::config_validation(
            "pool.capacity",
            format!("capacity must be > 0, got {}", pool.capacity),
        ));
    }

    if pool.input_buffer == 0 {
        return Err(ContractError::config_validation(
            "pool.input_buffer",
            format!("input_buffer must be > 0, got {}", pool.input_buffer),
        ));
    }

    Ok(())
}

/// Validate the command section
fn validate_command(blueprint: &PoolBlueprint) -> Result<(), ContractError> {
    if let Some(command) = &blueprint.command {
        if command.program.trim().is_empty() {
            return Err(ContractError::config_validation(
                "command.program",
                "program cannot be empty",
            ));
        }
    }
    Ok(())
}

/// Validate logging settings
fn validate_observability(blueprint: &PoolBlueprint) -> Result<(), ContractError> {
    let level = blueprint.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ContractError::config_validation(
            "observability.log_level",
            format!(
                "unknown log level '{}', expected one of {:?}",
                blueprint.observability.log_level, LOG_LEVELS
            ),
        ));
    }
    Ok(())
}
