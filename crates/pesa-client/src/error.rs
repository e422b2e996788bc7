//! Daraja client error types.
//!
//! Every variant carries a human-readable `reason` with the endpoint,
//! HTTP status and a body excerpt where available. Reasons never contain
//! credentials, tokens, or generated passwords.

/// Errors from the OAuth token endpoint.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Transport failure, non-2xx status, or a malformed token response.
    #[error("access token acquisition failed: {reason}")]
    TokenAcquisitionFailed {
        /// Description of the failure.
        reason: String,
    },
}

/// Errors from push initiation and status queries.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// No access token could be obtained for the call.
    #[error("authentication unavailable: {source}")]
    AuthenticationUnavailable {
        #[from]
        source: AuthError,
    },

    /// The push request failed or was not accepted by the network.
    #[error("STK push initiation failed: {reason}")]
    PushInitiationFailed {
        /// Description of the failure.
        reason: String,
    },

    /// The status query failed or returned an unreadable response.
    #[error("STK status query failed: {reason}")]
    StatusQueryFailed {
        /// Description of the failure.
        reason: String,
    },

    /// The client could not be built from its configuration.
    #[error("M-Pesa client not configured: {reason}")]
    NotConfigured {
        /// Why configuration is missing or invalid.
        reason: String,
    },
}

impl PaymentError {
    /// Whether repeating the same call could succeed.
    ///
    /// Only status query failures qualify. Push initiation is never
    /// retryable since a repeated push can charge the payer twice, and a
    /// failed token fetch ends the logical operation it belongs to.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StatusQueryFailed { .. })
    }
}

/// Errors from webhook payload parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    /// A required node is missing or an item has an unexpected shape.
    #[error("callback payload unparseable: {reason}")]
    Unparseable {
        /// What was missing or malformed.
        reason: String,
    },
}

/// Maximum number of response body characters kept in error reasons.
const BODY_EXCERPT_CHARS: usize = 256;

/// Truncate a response body for inclusion in an error reason.
pub(crate) fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut excerpt: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    excerpt.push_str("...");
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_idempotent_failures_are_retryable() {
        assert!(PaymentError::StatusQueryFailed {
            reason: "HTTP 500".into()
        }
        .is_retryable());
        assert!(!PaymentError::from(AuthError::TokenAcquisitionFailed {
            reason: "timeout".into()
        })
        .is_retryable());
        assert!(!PaymentError::PushInitiationFailed {
            reason: "HTTP 500".into()
        }
        .is_retryable());
    }

    #[test]
    fn body_excerpt_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let excerpt = body_excerpt(&long);
        assert_eq!(excerpt.len(), BODY_EXCERPT_CHARS + 3);
        assert!(excerpt.ends_with("..."));
        assert_eq!(body_excerpt("  short  "), "short");
    }
}
