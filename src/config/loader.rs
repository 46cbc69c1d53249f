//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::EngineConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[routing]\npoll_interval_ms = 10").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.routing.poll_interval_ms, 10);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/engine.toml")),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(parse_config("[routing"), Err(ConfigError::Parse(_))));

        let err = parse_config("[routing]\npoll_interval_ms = 0").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: routing.poll_interval_ms must be greater than zero"
        );
    }
}
