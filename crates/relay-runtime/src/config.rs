//! Configuration for the Relay runtime
//!
//! Every setting has a default and can be overridden from the environment.
//! Invalid values are logged and ignored.

use relay_core::{AnalyticsPeriod, FacadeConfig, ModuleId};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::{RuntimeError, RuntimeResult};

/// Backend URL scheme selecting the in-memory gateway
pub const MEMORY_SCHEME: &str = "memory://";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Base URL of the backend API, or `memory://` for the in-memory backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Bearer token sent to the backend
    #[serde(default)]
    pub api_token: Option<String>,

    /// Backend request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Transactions cached per module façade
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Historical transactions requested on activation
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Analytics window
    #[serde(default)]
    pub analytics_period: AnalyticsPeriod,

    /// YAML catalogue replacing the built-in one
    #[serde(default)]
    pub catalogue_file: Option<PathBuf>,

    /// Modules to activate; empty means every module in the catalogue
    #[serde(default)]
    pub modules: Vec<ModuleId>,
}

fn default_backend_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    relay_core::application::module_facade::DEFAULT_CACHE_CAPACITY
}

fn default_history_limit() -> usize {
    relay_core::application::module_facade::DEFAULT_HISTORY_LIMIT
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            cache_capacity: default_cache_capacity(),
            history_limit: default_history_limit(),
            analytics_period: AnalyticsPeriod::default(),
            catalogue_file: None,
            modules: Vec::new(),
        }
    }
}

fn parse_or_warn<T: FromStr>(name: &str, value: &str, target: &mut T) {
    match value.trim().parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!("Invalid {} value: {}", name, value),
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    pub fn load() -> RuntimeResult<Self> {
        Self::load_from(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> RuntimeResult<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("RELAY_BACKEND_URL") {
            config.backend_url = url.trim().to_string();
        }

        if let Some(token) = lookup("RELAY_API_TOKEN") {
            if !token.is_empty() {
                config.api_token = Some(token);
            }
        }

        if let Some(timeout) = lookup("RELAY_REQUEST_TIMEOUT_SECS") {
            parse_or_warn("RELAY_REQUEST_TIMEOUT_SECS", &timeout, &mut config.request_timeout_secs);
        }

        if let Some(capacity) = lookup("RELAY_CACHE_CAPACITY") {
            parse_or_warn("RELAY_CACHE_CAPACITY", &capacity, &mut config.cache_capacity);
        }

        if let Some(limit) = lookup("RELAY_HISTORY_LIMIT") {
            parse_or_warn("RELAY_HISTORY_LIMIT", &limit, &mut config.history_limit);
        }

        if let Some(period) = lookup("RELAY_ANALYTICS_PERIOD") {
            parse_or_warn("RELAY_ANALYTICS_PERIOD", &period, &mut config.analytics_period);
        }

        if let Some(file) = lookup("RELAY_CATALOGUE_FILE") {
            if !file.trim().is_empty() {
                config.catalogue_file = Some(PathBuf::from(file.trim()));
            }
        }

        if let Some(modules) = lookup("RELAY_MODULES") {
            config.modules = modules
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(ModuleId::from)
                .collect();
        }

        config.validate()?;

        if config.api_token.is_none() && !config.uses_memory_backend() {
            warn!("No RELAY_API_TOKEN provided - backend requests will be unauthenticated");
        }

        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.backend_url.is_empty() {
            return Err(RuntimeError::ConfigError("Backend URL is required".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(RuntimeError::ConfigError(
                "Request timeout must be at least one second".to_string(),
            ));
        }

        if self.cache_capacity == 0 {
            return Err(RuntimeError::ConfigError(
                "Cache capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether the in-memory backend is selected
    pub fn uses_memory_backend(&self) -> bool {
        self.backend_url.starts_with(MEMORY_SCHEME)
    }

    /// Backend request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Settings for the module façades
    pub fn facade_config(&self) -> FacadeConfig {
        FacadeConfig {
            cache_capacity: self.cache_capacity,
            history_limit: self.history_limit,
            analytics_period: self.analytics_period,
        }
    }
}
