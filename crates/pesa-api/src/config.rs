//! Server configuration.

use std::net::SocketAddr;

use pesa_client::retry::{DEFAULT_MAX_RETRIES, MAX_RETRIES_CAP};

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Runtime configuration for the API server.
///
/// Custom `Debug` implementation redacts the database URL, which usually
/// embeds a password.
#[derive(Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Postgres URL; `None` runs in-memory only.
    pub database_url: Option<String>,
    /// Retries after the first status query attempt.
    pub query_retries: u32,
    pub metrics_enabled: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("query_retries", &self.query_retries)
            .field("metrics_enabled", &self.metrics_enabled)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            query_retries: DEFAULT_MAX_RETRIES,
            metrics_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `HTTP_BIND` (default: `0.0.0.0:8080`)
    /// - `DATABASE_URL` (optional; absent means in-memory only)
    /// - `PESA_QUERY_RETRIES` (default: 2, capped at 5)
    /// - `PESA_METRICS_ENABLED` (default: true; only `false` disables)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_bind = std::env::var("HTTP_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
        let bind = raw_bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(raw_bind.clone()))?;

        Ok(Self {
            bind,
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            query_retries: parse_query_retries(std::env::var("PESA_QUERY_RETRIES").ok().as_deref()),
            metrics_enabled: std::env::var("PESA_METRICS_ENABLED")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
        })
    }
}

/// Unparseable values fall back to the default; large ones are capped.
fn parse_query_retries(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_MAX_RETRIES)
        .min(MAX_RETRIES_CAP)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HTTP_BIND is not a socket address: {0}")]
    InvalidBind(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_all_interfaces() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind.to_string(), DEFAULT_BIND);
        assert_eq!(cfg.query_retries, 2);
        assert!(cfg.metrics_enabled);
    }

    #[test]
    fn query_retries_are_capped() {
        assert_eq!(parse_query_retries(None), DEFAULT_MAX_RETRIES);
        assert_eq!(parse_query_retries(Some("nope")), DEFAULT_MAX_RETRIES);
        assert_eq!(parse_query_retries(Some("0")), 0);
        assert_eq!(parse_query_retries(Some(" 4 ")), 4);
        assert_eq!(parse_query_retries(Some("4000000000")), MAX_RETRIES_CAP);
    }

    #[test]
    fn debug_redacts_database_url() {
        let cfg = ServerConfig {
            database_url: Some("postgres://pesa:hunter2@db/pesa".into()),
            ..ServerConfig::default()
        };
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
