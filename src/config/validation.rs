//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (poll interval > 0, at least one choice)
//! - Detect duplicate source names and unusable admin settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("routing.poll_interval_ms must be greater than zero")]
    ZeroPollInterval,

    #[error("load_balancing.power_of_n_choices must be at least 1")]
    ZeroChoices,

    #[error("source #{0} has an empty name")]
    EmptySourceName(usize),

    #[error("source name '{0}' is used more than once")]
    DuplicateSource(String),

    #[error("admin.bind_address '{0}' is not a socket address")]
    InvalidAdminAddress(String),

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingApiKey,
}

/// Check the config, collecting every error.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.routing.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }
    if config.load_balancing.power_of_n_choices == 0 {
        errors.push(ValidationError::ZeroChoices);
    }

    let mut names = HashSet::new();
    for (i, source) in config.sources.iter().enumerate() {
        if source.name.trim().is_empty() {
            errors.push(ValidationError::EmptySourceName(i));
        } else if !names.insert(source.name.as_str()) {
            errors.push(ValidationError::DuplicateSource(source.name.clone()));
        }
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAdminAddress(config.admin.bind_address.clone()));
        }
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::MissingApiKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
