//! Configuration Module
//!
//! Explicit client configuration, loadable from environment variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::store::ConnectionParams;

/// Default time-to-live for stored results (24 hours)
pub const DEFAULT_TTL_SECS: u64 = 60 * 60 * 24;

/// Client configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store host name
    pub host: String,
    /// Store port
    pub port: u16,
    /// Logical database index
    pub db: i64,
    /// Optional password
    pub password: Option<String>,
    /// Attempts made by `reconnect` when no explicit count is given
    pub conn_retries: u32,
    /// Upper bound in seconds for a single backoff sleep
    pub max_sleep_secs: u64,
    /// Prefix applied to every key the client touches
    pub key_prefix: Option<String>,
    /// Default namespace for memoized calls
    pub namespace: Option<String>,
    /// Hash call arguments into a digest (true) or encode them verbatim (false)
    pub hash_keys: bool,
    /// TTL in seconds used when a write gives none
    pub default_ttl_secs: u64,
    /// Timeout in seconds for establishing a connection
    pub connect_timeout_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_REDIS_HOST` - Store host (default: localhost)
    /// - `CACHE_REDIS_PORT` - Store port (default: 6379)
    /// - `CACHE_REDIS_DB` - Database index (default: 0)
    /// - `CACHE_REDIS_PASSWORD` - Password (default: none)
    /// - `CACHE_CONN_RETRIES` - Reconnect attempts (default: 1)
    /// - `CACHE_MAX_SLEEP_SECS` - Backoff cap in seconds (default: 30)
    /// - `CACHE_KEY_PREFIX` - Key prefix (default: none)
    /// - `CACHE_NAMESPACE` - Default namespace (default: none)
    /// - `CACHE_HASH_KEYS` - Hash argument keys (default: true)
    /// - `CACHE_DEFAULT_TTL_SECS` - Default TTL in seconds (default: 86400)
    /// - `CACHE_CONNECT_TIMEOUT_SECS` - Connect timeout in seconds (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("CACHE_REDIS_HOST")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.host),
            port: parse_env("CACHE_REDIS_PORT").unwrap_or(defaults.port),
            db: parse_env("CACHE_REDIS_DB").unwrap_or(defaults.db),
            password: env::var("CACHE_REDIS_PASSWORD").ok().filter(|v| !v.is_empty()),
            conn_retries: parse_env("CACHE_CONN_RETRIES").unwrap_or(defaults.conn_retries),
            max_sleep_secs: parse_env("CACHE_MAX_SLEEP_SECS").unwrap_or(defaults.max_sleep_secs),
            key_prefix: env::var("CACHE_KEY_PREFIX").ok().filter(|v| !v.is_empty()),
            namespace: env::var("CACHE_NAMESPACE").ok().filter(|v| !v.is_empty()),
            hash_keys: parse_env("CACHE_HASH_KEYS").unwrap_or(defaults.hash_keys),
            default_ttl_secs: parse_env("CACHE_DEFAULT_TTL_SECS")
                .unwrap_or(defaults.default_ttl_secs),
            connect_timeout_secs: parse_env("CACHE_CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connect_timeout_secs),
        }
    }

    // == Validate ==
    /// Rejects settings the connection manager cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(CacheError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.conn_retries == 0 {
            return Err(CacheError::InvalidConfig(
                "conn_retries must be at least 1".to_string(),
            ));
        }
        if self.max_sleep_secs == 0 {
            return Err(CacheError::InvalidConfig(
                "max_sleep_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection parameters handed to the store backend.
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            db: self.db,
            password: self.password.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    // == Default TTL ==
    /// Lifetime of stored results when a write gives none.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    // == Max Sleep ==
    /// Cap on a single backoff sleep.
    pub fn max_sleep(&self) -> Duration {
        Duration::from_secs(self.max_sleep_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            conn_retries: 1,
            max_sleep_secs: 30,
            key_prefix: None,
            namespace: None,
            hash_keys: true,
            default_ttl_secs: DEFAULT_TTL_SECS,
            connect_timeout_secs: 5,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6379);
        assert_eq!(config.db, 0);
        assert_eq!(config.conn_retries, 1);
        assert_eq!(config.max_sleep_secs, 30);
        assert!(config.hash_keys);
        assert_eq!(config.default_ttl(), Duration::from_secs(86_400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "CACHE_REDIS_HOST",
            "CACHE_REDIS_PORT",
            "CACHE_CONN_RETRIES",
            "CACHE_MAX_SLEEP_SECS",
            "CACHE_HASH_KEYS",
            "CACHE_NAMESPACE",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6379);
        assert_eq!(config.conn_retries, 1);
        assert_eq!(config.max_sleep_secs, 30);
        assert!(config.hash_keys);
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let config = Config {
            conn_retries: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let config = Config {
            host: "  ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connection_params() {
        let config = Config {
            host: "cache.internal".to_string(),
            db: 3,
            password: Some("secret".to_string()),
            ..Config::default()
        };
        let params = config.connection_params();
        assert_eq!(params.host, "cache.internal");
        assert_eq!(params.db, 3);
        assert_eq!(params.password.as_deref(), Some("secret"));
        assert_eq!(params.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"host":"redis","namespace":"orders"}"#).unwrap();
        assert_eq!(config.host, "redis");
        assert_eq!(config.namespace.as_deref(), Some("orders"));
        assert_eq!(config.port, 6379);
    }
}
