//! Configuration data types.

use crate::metrics::{default_size_buckets, DEFAULT_DURATION_BUCKETS};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Application listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Metrics settings
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Application listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address and port to listen on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Value of the `service` label on every instrument
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            service_name: default_service_name(),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Scrape path; requests to it are never instrumented
    #[serde(default = "default_metrics_path")]
    pub path: String,

    /// Optional dedicated address serving only the scrape path
    #[serde(default)]
    pub address: Option<SocketAddr>,

    /// Request duration histogram buckets, in seconds
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Response size histogram buckets, in bytes
    #[serde(default = "default_size_buckets")]
    pub size_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            address: None,
            duration_buckets: default_duration_buckets(),
            size_buckets: default_size_buckets(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_service_name() -> String {
    "fastapi-service".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_duration_buckets() -> Vec<f64> {
    DEFAULT_DURATION_BUCKETS.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.global.log_format, LogFormat::Json);
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.server.service_name, "fastapi-service");
        assert_eq!(config.metrics.path, "/metrics");
        assert!(config.metrics.address.is_none());
        assert_eq!(config.metrics.duration_buckets.len(), 14);
        assert_eq!(config.metrics.size_buckets.len(), 8);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str(
            r#"
server:
  service_name: orders
metrics:
  duration_buckets: [0.1, 1, 10]
"#,
        )
        .unwrap();

        assert_eq!(config.server.service_name, "orders");
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.metrics.duration_buckets, vec![0.1, 1.0, 10.0]);
        assert_eq!(config.metrics.size_buckets.len(), 8);
    }

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_yaml::from_str("pretty").unwrap();
        assert_eq!(format, LogFormat::Pretty);

        let format: LogFormat = serde_yaml::from_str("json").unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
