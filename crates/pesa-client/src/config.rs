//! Daraja client configuration.
//!
//! Selects the network environment (sandbox or production), holds the
//! merchant credentials, and derives endpoint URLs. Load it with
//! [`DarajaConfig::from_env`] or build it explicitly for tests.

use url::Url;
use zeroize::Zeroizing;

/// Sandbox base URL.
pub const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";

/// Production base URL.
pub const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

// Relative to the base URL, which may carry a path prefix.
pub(crate) const TOKEN_PATH: &str = "oauth/v1/generate?grant_type=client_credentials";
pub(crate) const PUSH_PATH: &str = "mpesa/stkpush/v1/processrequest";
pub(crate) const QUERY_PATH: &str = "mpesa/stkpushquery/v1/query";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which Daraja deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        })
    }
}

/// Configuration for the Daraja STK-Push API.
///
/// Custom `Debug` implementation redacts the consumer secret and passkey
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct DarajaConfig {
    pub environment: Environment,
    /// Base URL; defaults to the environment's URL.
    pub base_url: Url,
    pub consumer_key: String,
    pub consumer_secret: Zeroizing<String>,
    /// Paybill or till number receiving the funds.
    pub business_short_code: String,
    /// Lipa Na M-Pesa Online passkey used to derive the request password.
    pub passkey: Zeroizing<String>,
    /// Public URL the network posts the settlement result to.
    pub callback_url: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Reuse access tokens until shortly before they expire.
    pub token_cache: bool,
}

impl std::fmt::Debug for DarajaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarajaConfig")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url.as_str())
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("business_short_code", &self.business_short_code)
            .field("passkey", &"[REDACTED]")
            .field("callback_url", &self.callback_url.as_str())
            .field("timeout_secs", &self.timeout_secs)
            .field("token_cache", &self.token_cache)
            .finish()
    }
}

impl DarajaConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `MPESA_CONSUMER_KEY` (required)
    /// - `MPESA_CONSUMER_SECRET` (required)
    /// - `MPESA_BUSINESS_SHORT_CODE` (required)
    /// - `MPESA_PASSKEY` (required)
    /// - `MPESA_CALLBACK_URL` (required)
    /// - `MPESA_ENVIRONMENT` (`sandbox` | `production`, default: `sandbox`)
    /// - `MPESA_BASE_URL` (default: the environment's base URL)
    /// - `MPESA_TIMEOUT_SECS` (default: 30)
    /// - `MPESA_TOKEN_CACHE` (default: off)
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match std::env::var("MPESA_ENVIRONMENT") {
            Ok(raw) => raw.parse()?,
            Err(_) => Environment::default(),
        };

        Ok(Self {
            environment,
            base_url: env_url("MPESA_BASE_URL", environment.default_base_url())?,
            consumer_key: required("MPESA_CONSUMER_KEY")?,
            consumer_secret: Zeroizing::new(required("MPESA_CONSUMER_SECRET")?),
            business_short_code: required("MPESA_BUSINESS_SHORT_CODE")?,
            passkey: Zeroizing::new(required("MPESA_PASSKEY")?),
            callback_url: parse_url("MPESA_CALLBACK_URL", &required("MPESA_CALLBACK_URL")?)?,
            timeout_secs: std::env::var("MPESA_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            token_cache: std::env::var("MPESA_TOKEN_CACHE")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }

    /// A sandbox configuration pointing at a local mock server.
    ///
    /// Uses the public sandbox short code and passkey.
    pub fn local_mock(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::Sandbox,
            base_url: parse_url("base_url", base_url)?,
            consumer_key: "test-consumer-key".to_string(),
            consumer_secret: Zeroizing::new("test-consumer-secret".to_string()),
            business_short_code: "174379".to_string(),
            passkey: Zeroizing::new(
                "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919".to_string(),
            ),
            callback_url: parse_url("callback_url", "https://example.com/v1/mpesa/callback")?,
            timeout_secs: 5,
            token_cache: false,
        })
    }

    pub fn token_url(&self) -> Result<Url, ConfigError> {
        self.endpoint(TOKEN_PATH)
    }

    pub fn push_url(&self) -> Result<Url, ConfigError> {
        self.endpoint(PUSH_PATH)
    }

    pub fn query_url(&self) -> Result<Url, ConfigError> {
        self.endpoint(QUERY_PATH)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let prefixed = format!("{}/", base.path());
            base.set_path(&prefixed);
        }
        base.join(path)
            .map_err(|e| ConfigError::InvalidUrl(path.to_string(), e.to_string()))
    }
}

fn required(var: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(var.to_string())),
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    parse_url(var, &raw)
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(name.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingVar(String),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("unknown M-Pesa environment {0:?} (expected sandbox or production)")]
    InvalidEnvironment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = DarajaConfig::local_mock("http://127.0.0.1:9000").unwrap();
        assert_eq!(cfg.business_short_code, "174379");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(
            cfg.push_url().unwrap().as_str(),
            "http://127.0.0.1:9000/mpesa/stkpush/v1/processrequest"
        );
    }

    #[test]
    fn base_url_path_prefix_preserved() {
        for base in ["https://proxy.internal/daraja", "https://proxy.internal/daraja/"] {
            let cfg = DarajaConfig::local_mock(base).unwrap();
            assert_eq!(
                cfg.query_url().unwrap().as_str(),
                "https://proxy.internal/daraja/mpesa/stkpushquery/v1/query"
            );
        }
    }

    #[test]
    fn token_url_keeps_grant_type() {
        let cfg = DarajaConfig::local_mock("http://127.0.0.1:9000").unwrap();
        let url = cfg.token_url().unwrap();
        assert_eq!(url.path(), "/oauth/v1/generate");
        assert_eq!(url.query(), Some("grant_type=client_credentials"));
    }

    #[test]
    fn environment_selects_base_url() {
        assert_eq!(
            "production".parse::<Environment>().unwrap().default_base_url(),
            "https://api.safaricom.co.ke"
        );
        assert_eq!(
            " Sandbox ".parse::<Environment>().unwrap(),
            Environment::Sandbox
        );
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = DarajaConfig::local_mock("http://127.0.0.1:9000").unwrap();
        let rendered = format!("{cfg:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("test-consumer-secret"));
        assert!(!rendered.contains("bfb279f9"));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("PESA_NONEXISTENT_VAR_12345", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn required_rejects_blank() {
        std::env::set_var("PESA_TEST_BLANK_VAR", "  ");
        let result = required("PESA_TEST_BLANK_VAR");
        std::env::remove_var("PESA_TEST_BLANK_VAR");
        assert!(matches!(result, Err(ConfigError::MissingVar(_))));
    }
}
