//! Meeting Relay configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults; nothing here is secret.

use std::env;
use thiserror::Error;

/// Default bind address for the combined WebSocket/HTTP server.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default maximum number of concurrently live meetings.
pub const DEFAULT_MAX_MEETINGS: usize = 1024;

/// Default graceful-shutdown deadline in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 10;

/// Default deployment region label (used only for logging).
pub const DEFAULT_REGION: &str = "local";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse.
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Meeting Relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the WebSocket/HTTP server (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrently live meetings; joins beyond this are shed.
    pub max_meetings: usize,

    /// Deadline for draining actors on shutdown.
    pub shutdown_grace_seconds: u64,

    /// Deployment region identifier (e.g. "us-east-1").
    pub region: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            max_meetings: DEFAULT_MAX_MEETINGS,
            shutdown_grace_seconds: DEFAULT_SHUTDOWN_GRACE_SECONDS,
            region: DEFAULT_REGION.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a numeric variable is set
    /// but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_address =
            env::var("RELAY_BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());

        let max_meetings = parse_var("RELAY_MAX_MEETINGS", DEFAULT_MAX_MEETINGS)?;
        let shutdown_grace_seconds =
            parse_var("RELAY_SHUTDOWN_GRACE_SECONDS", DEFAULT_SHUTDOWN_GRACE_SECONDS)?;

        let region = env::var("RELAY_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());

        Ok(Self {
            bind_address,
            max_meetings,
            shutdown_grace_seconds,
            region,
        })
    }
}

/// Parse an optional numeric environment variable, falling back to a default.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.max_meetings, DEFAULT_MAX_MEETINGS);
        assert_eq!(config.shutdown_grace_seconds, DEFAULT_SHUTDOWN_GRACE_SECONDS);
        assert_eq!(config.region, DEFAULT_REGION);
    }

    #[test]
    fn test_invalid_numeric_value_rejected() {
        let result: Result<usize, _> = "not-a-number".parse();
        assert!(result.is_err());

        let err = ConfigError::InvalidValue {
            name: "RELAY_MAX_MEETINGS".to_string(),
            value: "not-a-number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for RELAY_MAX_MEETINGS: not-a-number"
        );
    }
}
