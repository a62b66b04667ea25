//! Error taxonomy for upstream fetches
//!
//! Every failure that can escape the fetch pipeline is classified into one
//! of these categories. The `Display` strings are the user-facing messages;
//! callers print them directly and never expose a raw error chain.

use reqwest::StatusCode;
use thiserror::Error;

/// Typed errors produced by the fetch/cache pipeline.
///
/// `Clone` is required so a single outcome can be fanned out to every waiter
/// of a deduplicated in-flight request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The attempt exceeded its per-call deadline
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure (DNS, refused, reset, TLS)
    #[error("network unreachable: {0}")]
    Network(String),

    /// HTTP 429 from upstream; retried with an elevated backoff
    #[error("rate limited by upstream, backing off")]
    RateLimited,

    /// HTTP 5xx from upstream
    #[error("upstream server error (HTTP {0})")]
    Server(u16),

    /// HTTP 4xx other than 429; never retried
    #[error("upstream rejected the request (HTTP {0})")]
    Client(u16),

    /// Response body did not match any known source contract
    #[error("unrecognized response format: {0}")]
    MalformedResponse(String),

    /// No adapter registered for the requested platform id
    #[error("unknown platform: {0}")]
    UnknownSource(String),

    /// Local minimum-interval throttle rejected the request.
    /// A no-op signal to the immediate caller, not a failure to surface.
    #[error("request throttled, try again shortly")]
    Throttled,
}

impl ApiError {
    /// Default retry-eligibility policy: network-class failures, timeouts,
    /// 5xx and 429 are transient; everything else propagates immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout | ApiError::Network(_) | ApiError::Server(_) | ApiError::RateLimited
        )
    }

    /// Classify a non-success HTTP status code.
    pub fn from_status(status: StatusCode) -> Self {
        let code = status.as_u16();
        if code == 429 {
            ApiError::RateLimited
        } else if status.is_server_error() {
            ApiError::Server(code)
        } else {
            ApiError::Client(code)
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if let Some(status) = err.status() {
            ApiError::from_status(status)
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
