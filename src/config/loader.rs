//! Configuration file loading.

use crate::config::{validate_config, Config};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Load and validate configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::ValidationError)?;
    Ok(config)
}

/// Load configuration from a YAML file without validating it.
///
/// Used when further overrides are applied before validation.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    from_yaml(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// An empty document yields the default configuration.
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    let config = from_yaml(contents)?;
    validate_config(&config).map_err(ConfigError::ValidationError)?;
    Ok(config)
}

fn from_yaml(contents: &str) -> Result<Config, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_file() {
        let yaml = r#"
global:
  log_level: debug
  log_format: pretty
server:
  listen: "127.0.0.1:9000"
  service_name: checkout
metrics:
  path: /internal/metrics
  address: "127.0.0.1:9100"
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.global.log_level, "debug");
        assert_eq!(config.server.service_name, "checkout");
        assert_eq!(config.metrics.path, "/internal/metrics");
        assert_eq!(
            config.metrics.address,
            Some("127.0.0.1:9100".parse().unwrap())
        );
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = NamedTempFile::new().unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.service_name, "fastapi-service");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.yaml");
        assert!(matches!(result.unwrap_err(), ConfigError::ReadError(_)));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let result = parse_config("not: valid: yaml: {{{}}}");
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_read_config_skips_validation() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"server:\n  service_name: \"\"\n").unwrap();

        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
        let config = read_config(file.path()).unwrap();
        assert_eq!(config.server.service_name, "");
    }

    #[test]
    fn test_validation_error_surfaces() {
        let result = parse_config("metrics:\n  path: metrics\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }
}
