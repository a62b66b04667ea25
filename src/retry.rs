//! Exponential-backoff retry executor
//!
//! Wraps a fallible async operation and retries transient failures. The
//! eligibility predicate is pluggable; the default follows
//! [`ApiError::is_retryable`]. HTTP 429 gets its own, distinctly larger
//! base delay that doubles per retry, since being rate limited means the
//! caller must back off harder than for a generic 5xx.

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

/// Retry budget and backoff shape for one logical operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Base delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied per additional retry
    pub backoff_factor: u32,
    /// Base delay used instead of `initial_delay` once a 429 is seen
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2,
            rate_limit_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt budget and first-retry delay.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Self::default()
        }
    }

    /// Wait before the retry following failed attempt `attempt` (0-based).
    fn delay_for(&self, attempt: u32, error: &ApiError) -> Duration {
        let base = match error {
            ApiError::RateLimited => self.rate_limit_delay,
            _ => self.initial_delay,
        };
        base * self.backoff_factor.saturating_pow(attempt)
    }
}

/// Context handed to the operation on each attempt.
///
/// `rate_limited` turns true once any prior attempt failed with HTTP 429;
/// operations that normally read-merge-write can use it to skip the
/// pre-fetch and write directly, reducing the chance of tripping the limit
/// again.
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    /// 0-based attempt index
    pub number: u32,
    /// Whether a 429 was observed on an earlier attempt of this operation
    pub rate_limited: bool,
}

/// Run `operation` with the default retry-eligibility policy.
pub async fn retry_request<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, ApiError>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    retry_request_with(policy, operation, ApiError::is_retryable).await
}

/// Run `operation` with a caller-supplied retry-eligibility predicate.
///
/// A failure the predicate rejects propagates immediately; otherwise the
/// executor sleeps `base * factor^attempt` and tries again until the attempt
/// budget is spent, after which the last error propagates.
pub async fn retry_request_with<T, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, ApiError>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    P: Fn(&ApiError) -> bool,
{
    let mut rate_limited = false;

    for attempt in 0..policy.max_attempts {
        let context = Attempt {
            number: attempt,
            rate_limited,
        };

        match operation(context).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !should_retry(&error) {
                    return Err(error);
                }
                if attempt + 1 == policy.max_attempts {
                    return Err(error);
                }

                if matches!(error, ApiError::RateLimited) {
                    rate_limited = true;
                }

                let delay = policy.delay_for(attempt, &error);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    // max_attempts is validated non-zero by construction in practice; an
    // empty budget degenerates to a timeout-class failure.
    Err(ApiError::Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            backoff_factor: 2,
            rate_limit_delay: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_request(&fast_policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ApiError>(7) }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_errors_then_success() {
        let calls = AtomicU32::new(0);
        let result = retry_request(&fast_policy(4), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::Server(503))
                } else {
                    Ok(99)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(99));
        // Succeeded on attempt 3; no further calls made.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_attempted_exactly_once() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = retry_request(&fast_policy(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Client(404)) }
        })
        .await;

        assert_eq!(result, Err(ApiError::Client(404)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = retry_request(&fast_policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Timeout) }
        })
        .await;

        assert_eq!(result, Err(ApiError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_three_times_then_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            ..RetryPolicy::default()
        };

        let result = retry_request(&policy, |attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            // After the first 429, every subsequent attempt must see the flag.
            if n > 0 {
                assert!(attempt.rate_limited);
            }
            async move {
                if n < 3 {
                    Err(ApiError::RateLimited)
                } else {
                    Ok("payload")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("payload"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_custom_predicate_always_retries() {
        let calls = AtomicU32::new(0);
        // MalformedResponse is not retryable by default, but a custom
        // predicate (the book-ranking proxy walk) may insist.
        let result = retry_request_with(
            &fast_policy(2),
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ApiError::MalformedResponse("bad html".into()))
                    } else {
                        Ok(1)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rate_limit_delay_escalates() {
        let policy = RetryPolicy::default();
        let generic = policy.delay_for(0, &ApiError::Server(500));
        let limited = policy.delay_for(0, &ApiError::RateLimited);
        assert!(limited > generic);
        assert_eq!(
            policy.delay_for(1, &ApiError::RateLimited),
            Duration::from_secs(10)
        );
        assert_eq!(
            policy.delay_for(2, &ApiError::RateLimited),
            Duration::from_secs(20)
        );
    }
}
