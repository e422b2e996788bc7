//! Bounded retry with exponential backoff for idempotent Daraja calls.
//!
//! Only errors for which [`PaymentError::is_retryable`] holds are retried.
//! Push initiation is never retryable, so wrapping it here is harmless but
//! pointless; wrap status queries.

use std::future::Future;
use std::time::Duration;

use crate::error::PaymentError;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Upper bound accepted for configured retry counts.
pub const MAX_RETRIES_CAP: u32 = 5;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

/// Backoff before retry number `attempt` (zero-based).
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(factor))
}

/// Run `f` up to `max_retries + 1` times, backing off between attempts.
pub async fn retry_idempotent<T, F, Fut>(
    operation: &str,
    max_retries: u32,
    f: F,
) -> Result<T, PaymentError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, PaymentError>>,
{
    for attempt in 0..max_retries {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_retries,
                    "M-Pesa call failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    // Final attempt, no more retries.
    f().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retry_exhausts_all_attempts_on_retryable_failure() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = call_count.clone();

        let result: Result<(), _> = retry_idempotent("stk_query", 2, || {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err(PaymentError::StatusQueryFailed {
                    reason: "HTTP 503".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_failure_returns_immediately() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = call_count.clone();

        let result: Result<(), _> = retry_idempotent("stk_push", 3, || {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err(PaymentError::PushInitiationFailed {
                    reason: "HTTP 500".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(PaymentError::PushInitiationFailed { .. })));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = call_count.clone();

        let result: Result<(), _> = retry_idempotent("stk_query", 2, || {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err(PaymentError::from(crate::error::AuthError::TokenAcquisitionFailed {
                    reason: "HTTP 401".into(),
                }))
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(PaymentError::AuthenticationUnavailable { .. })
        ));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        assert_eq!(backoff_delay(0), Duration::from_millis(200));
        assert_eq!(backoff_delay(2), Duration::from_millis(800));
        assert_eq!(backoff_delay(200), Duration::from_millis(u64::MAX));
    }

    #[tokio::test]
    async fn success_after_transient_failure() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = call_count.clone();

        let result = retry_idempotent("stk_query", 2, || {
            let cc = cc.clone();
            async move {
                if cc.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(PaymentError::StatusQueryFailed {
                        reason: "timeout".into(),
                    })
                } else {
                    Ok("settled")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "settled");
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }
}
