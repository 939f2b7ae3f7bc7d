//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate configuration.
///
/// With no path the built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay deployment-specific values from the environment.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = var("FLEET_BREAKER_BIND_ADDR") {
        config.server.bind_address = value;
    }
    if let Some(value) = var("FLEET_BREAKER_STORE_URL") {
        config.store.url = value;
    }
    if let Some(value) = var("FLEET_BREAKER_ADMIN_API_KEY") {
        config.admin.api_key = value;
    }
    if let Some(value) = var("FLEET_BREAKER_LOG_LEVEL") {
        config.observability.log_level = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [server]
            bind_address = "127.0.0.1:9000"

            [breaker]
            failure_threshold = 2
            "#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.breaker.failure_threshold, 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nbind_address = ").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_errors_are_collected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [server]
            bind_address = "nope"

            [store]
            command_timeout_ms = 0
            "#
        )
        .unwrap();

        match load_config(Some(file.path())).unwrap_err() {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("FLEET_BREAKER_STORE_URL", "redis://cache:6379"),
            ("FLEET_BREAKER_LOG_LEVEL", "debug"),
        ]);
        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, |name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.store.url, "redis://cache:6379");
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }
}
