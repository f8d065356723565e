//! Retry with exponential back-off and jitter for the marketplace client.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors (network failures, 5xx, rate limit). A rate-limit error
//! carries the server's minimum wait, which replaces the computed back-off
//! for that attempt. Non-transient errors are returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::ProviderError;

const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - HTTP 5xx responses: transient server/infrastructure errors.
/// - HTTP 429: the server asked us to back off and try again.
///
/// **Not retriable (hard stop):**
/// - Other 4xx statuses: the request itself is wrong; retrying won't fix it.
/// - [`ProviderError::Deserialize`] — malformed response; retrying won't fix it.
pub(crate) fn is_retriable(err: &ProviderError) -> bool {
    match err {
        ProviderError::Http(e) => e.is_timeout() || e.is_connect(),
        ProviderError::RateLimited { .. } => true,
        ProviderError::Status { status, .. } => *status >= 500,
        ProviderError::Deserialize { .. } | ProviderError::InvalidBaseUrl(_) => false,
    }
}

/// Compute the delay in milliseconds before retry `attempt` (1-based).
///
/// A rate-limit error's server-specified wait overrides the exponential
/// schedule; otherwise the delay is `base * 2^(attempt-1)` with ±25 % jitter,
/// capped at 60 s.
fn delay_ms(err: &ProviderError, attempt: u32, backoff_base_ms: u64) -> u64 {
    if let ProviderError::RateLimited { retry_after_secs } = err {
        return retry_after_secs.saturating_mul(1000).min(MAX_DELAY_MS);
    }
    let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    {
        (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// After exhausting the budget the last error is surfaced to the caller —
/// the loop never fabricates an empty success.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = delay_ms(&err, attempt, backoff_base_ms);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms = delay,
                    error = %err,
                    "transient marketplace error — retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn deserialize_err() -> ProviderError {
        let src = serde_json::from_str::<()>("invalid").unwrap_err();
        ProviderError::Deserialize {
            context: "test".to_owned(),
            source: src,
        }
    }

    #[test]
    fn rate_limit_is_retriable() {
        assert!(is_retriable(&ProviderError::RateLimited {
            retry_after_secs: 5
        }));
    }

    #[test]
    fn server_errors_are_retriable() {
        assert!(is_retriable(&ProviderError::Status {
            status: 503,
            body: String::new()
        }));
    }

    #[test]
    fn client_errors_are_not_retriable() {
        assert!(!is_retriable(&ProviderError::Status {
            status: 400,
            body: String::new()
        }));
        assert!(!is_retriable(&ProviderError::Status {
            status: 404,
            body: String::new()
        }));
    }

    #[test]
    fn deserialize_error_is_not_retriable() {
        assert!(!is_retriable(&deserialize_err()));
    }

    #[test]
    fn rate_limit_wait_overrides_computed_backoff() {
        let err = ProviderError::RateLimited {
            retry_after_secs: 5,
        };
        assert_eq!(delay_ms(&err, 1, 1_000), 5_000);
        // The override also applies on later attempts where the exponential
        // schedule would have chosen a different value.
        assert_eq!(delay_ms(&err, 3, 1_000), 5_000);
    }

    #[test]
    fn backoff_doubles_per_attempt_within_jitter_band() {
        let err = ProviderError::Status {
            status: 500,
            body: String::new(),
        };
        for attempt in 1..=3u32 {
            let nominal = 1_000u64 << (attempt - 1);
            let d = delay_ms(&err, attempt, 1_000);
            let lo = nominal * 3 / 4;
            let hi = nominal * 5 / 4;
            assert!(
                (lo..=hi).contains(&d),
                "attempt {attempt}: delay {d} outside [{lo}, {hi}]"
            );
        }
    }

    #[test]
    fn delay_is_capped() {
        let err = ProviderError::RateLimited {
            retry_after_secs: 86_400,
        };
        assert_eq!(delay_ms(&err, 1, 1_000), MAX_DELAY_MS);
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ProviderError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ProviderError::RateLimited {
                        retry_after_secs: 0,
                    })
                } else {
                    Ok::<u32, ProviderError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagates_last_error_after_exhausting_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ProviderError>(ProviderError::Status {
                    status: 502,
                    body: "bad gateway".to_owned(),
                })
            }
        })
        .await;
        // max_retries=2 → 3 total attempts
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(ProviderError::Status { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn does_not_retry_permanent_rejection() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ProviderError>(ProviderError::Status {
                    status: 403,
                    body: "forbidden".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "4xx must not be retried"
        );
        assert!(matches!(
            result,
            Err(ProviderError::Status { status: 403, .. })
        ));
    }
}
