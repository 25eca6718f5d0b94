//! Logging setup for Relay binaries.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

pub mod logging;

pub use logging::{init_logging, LogExt};

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Log level filter (e.g., "info,relay_core=debug")
    pub log_filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
    /// Environment (dev, staging, prod)
    pub environment: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "relay".to_string(),
            log_filter: "info".to_string(),
            json_logs: false,
            environment: "dev".to_string(),
        }
    }
}

impl MonitoringConfig {
    /// Defaults overridden by `LOG_FILTER`, `LOG_JSON` and `ENVIRONMENT`
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let mut config = Self {
            service_name: service_name.into(),
            ..Self::default()
        };

        if let Ok(filter) = env::var("LOG_FILTER") {
            config.log_filter = filter;
        }

        if let Ok(json) = env::var("LOG_JSON") {
            config.json_logs = parse_flag(&json);
        }

        if let Ok(environment) = env::var("ENVIRONMENT") {
            config.environment = environment;
        }

        config
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Shutdown hook, logs the end of the process
pub fn shutdown(config: &MonitoringConfig) {
    info!(service_name = %config.service_name, "Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MonitoringConfig::default();
        assert_eq!(config.service_name, "relay");
        assert_eq!(config.log_filter, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
