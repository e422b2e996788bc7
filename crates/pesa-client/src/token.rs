//! OAuth access tokens.
//!
//! Tokens come from the client-credentials endpoint using HTTP Basic auth
//! over `consumerKey:consumerSecret`. By default every call fetches a fresh
//! token. With `token_cache` enabled, a token is reused until
//! [`EXPIRY_MARGIN_SECS`] before the TTL the network reported.

use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use zeroize::Zeroizing;

use crate::config::DarajaConfig;
use crate::error::{body_excerpt, AuthError};
use crate::wire::TokenResponse;

/// Cached tokens expire this long before the network TTL.
pub const EXPIRY_MARGIN_SECS: u64 = 60;

/// TTL assumed when the network omits `expires_in`.
const DEFAULT_TTL_SECS: u64 = 3599;

/// Encode `key:secret` for the Basic authorization header.
pub fn basic_credentials(consumer_key: &str, consumer_secret: &str) -> Zeroizing<String> {
    let pair = Zeroizing::new(format!("{consumer_key}:{consumer_secret}"));
    Zeroizing::new(STANDARD.encode(pair.as_bytes()))
}

/// A bearer token. `Debug` never prints the value.
#[derive(Clone)]
pub struct AccessToken {
    value: Zeroizing<String>,
    expires_in: Option<u64>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_in: Option<u64>) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
            expires_in,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Lifetime in seconds as reported by the network.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

struct CachedToken {
    consumer_key: String,
    token: AccessToken,
    valid_until: Instant,
}

/// Short-lived token cache keyed by consumer key.
#[derive(Default)]
pub(crate) struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub(crate) fn get(&self, consumer_key: &str) -> Option<AccessToken> {
        match &*self.slot.lock() {
            Some(cached)
                if cached.consumer_key == consumer_key && Instant::now() < cached.valid_until =>
            {
                Some(cached.token.clone())
            }
            _ => None,
        }
    }

    pub(crate) fn put(&self, consumer_key: &str, token: &AccessToken) {
        let ttl = token
            .expires_in
            .unwrap_or(DEFAULT_TTL_SECS)
            .saturating_sub(EXPIRY_MARGIN_SECS);
        if ttl == 0 {
            return;
        }
        *self.slot.lock() = Some(CachedToken {
            consumer_key: consumer_key.to_string(),
            token: token.clone(),
            valid_until: Instant::now() + Duration::from_secs(ttl),
        });
    }
}

/// GET a fresh token from the OAuth endpoint.
pub(crate) async fn fetch(
    http: &reqwest::Client,
    config: &DarajaConfig,
) -> Result<AccessToken, AuthError> {
    let url = config
        .token_url()
        .map_err(|e| AuthError::TokenAcquisitionFailed {
            reason: e.to_string(),
        })?;
    let credentials = basic_credentials(&config.consumer_key, &config.consumer_secret);

    let resp = http
        .get(url)
        .header(
            reqwest::header::AUTHORIZATION,
            format!("Basic {}", credentials.as_str()),
        )
        .send()
        .await
        .map_err(|e| AuthError::TokenAcquisitionFailed {
            reason: format!("transport error: {e}"),
        })?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::TokenAcquisitionFailed {
            reason: format!("HTTP {status}: {}", body_excerpt(&body)),
        });
    }

    let parsed: TokenResponse = resp
        .json()
        .await
        .map_err(|e| AuthError::TokenAcquisitionFailed {
            reason: format!("malformed token response: {e}"),
        })?;

    if parsed.access_token.is_empty() {
        return Err(AuthError::TokenAcquisitionFailed {
            reason: "empty access_token in response".to_string(),
        });
    }

    Ok(AccessToken::new(parsed.access_token, parsed.expires_in))
}
