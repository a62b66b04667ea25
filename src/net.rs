//! HTTP helpers with hard per-attempt deadlines
//!
//! Every network attempt in the pipeline goes through one of these wrappers:
//! the whole send-and-read is raced against a timeout, and non-success
//! statuses are classified into the [`ApiError`] taxonomy before anything
//! else sees them. A timed-out attempt surfaces as `ApiError::Timeout`,
//! which the retry executor treats as retryable.

use std::time::Duration;

use reqwest::Client;

use crate::error::ApiError;

/// GET a URL and parse the body as JSON, bounded by `timeout`.
pub async fn get_json(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<serde_json::Value, ApiError> {
    let body = get_with_accept(client, url, "application/json", timeout).await?;
    serde_json::from_str(&body)
        .map_err(|e| ApiError::MalformedResponse(format!("invalid JSON: {}", e)))
}

/// GET a URL and return the raw body text, bounded by `timeout`.
///
/// Used for the HTML-scraped source, which is fetched through CORS proxies.
pub async fn get_text(client: &Client, url: &str, timeout: Duration) -> Result<String, ApiError> {
    get_with_accept(
        client,
        url,
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        timeout,
    )
    .await
}

async fn get_with_accept(
    client: &Client,
    url: &str,
    accept: &str,
    timeout: Duration,
) -> Result<String, ApiError> {
    let request = async {
        let response = client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url, status = status.as_u16(), "non-success response");
            return Err(ApiError::from_status(status));
        }

        let body = response.text().await?;
        Ok(body)
    };

    tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| {
            tracing::warn!(url, timeout_ms = timeout.as_millis() as u64, "attempt timed out");
            ApiError::Timeout
        })?
}
