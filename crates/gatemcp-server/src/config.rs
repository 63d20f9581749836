//! Server configuration.
//!
//! [`ServerConfig`] is a plain serde struct with per-field defaults, so a
//! TOML file only needs to name the options it changes. Durations are
//! integer seconds/milliseconds in the file and converted to
//! [`Duration`] where they are consumed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum raw message size (1MB).
const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
    /// Worker threads in the request pool.
    pub worker_count: usize,
    /// Bounded task queue capacity.
    pub queue_capacity: usize,
    /// Resource cache capacity (entries). 0 disables caching.
    pub cache_capacity: usize,
    /// Default resource cache TTL in seconds.
    pub cache_default_ttl_secs: u64,
    /// Schema cache capacity (entries). 0 disables schema caching.
    pub schema_cache_capacity: usize,
    /// Maximum raw bytes accepted per message; exceeding yields an
    /// invalid-request response.
    pub max_message_size: usize,
    /// Rate-limit window in seconds.
    pub rate_limit_window_secs: u64,
    /// Maximum requests per window per client identity. 0 disables
    /// rate limiting.
    pub rate_limit_max: u64,
    /// Pre-shared API key; when present, ApiKey authentication is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Upstream backends; a non-empty list enables gateway mode.
    pub backends: Vec<BackendConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "gatemcp".to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            worker_count: 4,
            queue_capacity: 64,
            cache_capacity: 128,
            cache_default_ttl_secs: 300,
            schema_cache_capacity: 64,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            rate_limit_window_secs: 60,
            rate_limit_max: 0,
            api_key: None,
            backends: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError {
            message: e.to_string(),
        })
    }

    /// Returns the default resource-cache TTL as a duration.
    #[must_use]
    pub fn cache_default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_default_ttl_secs)
    }

    /// Returns the rate-limit window as a duration.
    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs.max(1))
    }

    /// Returns true when gateway mode is enabled.
    #[must_use]
    pub fn gateway_enabled(&self) -> bool {
        !self.backends.is_empty()
    }
}

/// Configuration for one upstream backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend name (for logs and errors).
    pub name: String,
    /// Backend host.
    pub host: String,
    /// Backend port.
    pub port: u16,
    /// Method-name prefixes routed to this backend.
    pub method_prefixes: Vec<String>,
    /// `read_resource` URI prefixes routed to this backend.
    pub resource_prefixes: Vec<String>,
    /// Connections kept open even when idle.
    pub min_connections: usize,
    /// Maximum simultaneous connections. 0 means the backend has no pool,
    /// which the router reports as a gateway configuration error.
    pub max_connections: usize,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Idle eviction threshold in milliseconds.
    pub idle_timeout_ms: u64,
    /// Per-request send/receive timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: "127.0.0.1".to_owned(),
            port: 0,
            method_prefixes: Vec::new(),
            resource_prefixes: Vec::new(),
            min_connections: 0,
            max_connections: 4,
            connect_timeout_ms: 1_000,
            idle_timeout_ms: 30_000,
            request_timeout_ms: 5_000,
        }
    }
}

impl BackendConfig {
    /// Connect timeout as a duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Idle eviction threshold as a duration.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Per-request timeout as a duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Error produced when configuration text cannot be parsed.
#[derive(Debug, Clone)]
pub struct ConfigError {
    /// Parse failure description.
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServerConfig::default();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.cache_capacity, 128);
        assert_eq!(config.rate_limit_max, 0);
        assert!(!config.gateway_enabled());
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            name = "demo"
            cache_capacity = 8
            api_key = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        // Untouched fields keep their defaults.
        assert_eq!(config.worker_count, 4);
    }

    #[test]
    fn backends_enable_gateway_mode() {
        let config = ServerConfig::from_toml_str(
            r#"
            [[backends]]
            name = "files"
            host = "10.0.0.2"
            port = 9000
            resource_prefixes = ["file://"]
            "#,
        )
        .unwrap();
        assert!(config.gateway_enabled());
        let backend = &config.backends[0];
        assert_eq!(backend.name, "files");
        assert_eq!(backend.port, 9000);
        assert_eq!(backend.max_connections, 4);
        assert_eq!(backend.request_timeout(), Duration::from_millis(5_000));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let err = ServerConfig::from_toml_str("worker_count = \"many\"").unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }
}
