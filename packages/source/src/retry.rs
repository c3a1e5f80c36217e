//! HTTP retry helpers for transient errors.
//!
//! Premise pages are fetched through [`send_json`], which retries
//! connection failures, timeouts, HTTP 429 and 5xx with exponential
//! backoff. Client errors are permanent and returned immediately.

use std::time::Duration;

use crate::SourceError;

/// Maximum number of full re-fetch attempts when the response body
/// cannot be decoded (truncated JSON, garbled response).
const MAX_BODY_RETRIES: u32 = 2;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Base unit of the exponential backoff.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after `max_retries`
/// connection-level retries, the server returns a non-retryable status,
/// or the body still cannot be parsed after the body-decode retries.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F, max_retries: u32) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut body_attempt = 0;

    loop {
        let response = send_inner(&build_request, max_retries).await?;
        let url = response.url().to_string();
        let status = response.status();

        let failure = match response.text().await {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => return Ok(value),
                Err(json_err) => {
                    let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
                    log::warn!(
                        "JSON parse failed for {url} (status={status}, {} bytes): {json_err}\n  \
                         body preview: {preview}",
                        text.len(),
                    );
                    SourceError::Json(json_err)
                }
            },
            Err(e) => {
                log::warn!("Response body read failed for {url} (status={status}): {e}");
                SourceError::Http(e)
            }
        };

        if body_attempt >= MAX_BODY_RETRIES {
            log::error!("Giving up on {url} after {MAX_BODY_RETRIES} body retries");
            return Err(failure);
        }
        body_attempt += 1;
        let delay = backoff(body_attempt);
        log::warn!("  body retry {body_attempt}/{MAX_BODY_RETRIES} in {delay:?}...");
        tokio::time::sleep(delay).await;
    }
}

/// Sends the request built by `build_request`, retrying on transient
/// errors up to `max_retries` times. Returns the successful response.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        let error = match build_request().send().await {
            Err(e) if is_transient(&e) => SourceError::Http(e),
            Err(e) => return Err(SourceError::Http(e)),
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    return Ok(response);
                }
                let error = SourceError::Status {
                    status: status.as_u16(),
                    url: response.url().to_string(),
                };
                // 4xx other than 429 is permanent.
                if !error.is_transient() {
                    return Err(error);
                }
                error
            }
        };

        if attempt >= max_retries {
            return Err(error);
        }
        attempt += 1;
        let delay = backoff(attempt);
        log::warn!("  transient error: {error}; retry {attempt}/{max_retries} in {delay:?}...");
        tokio::time::sleep(delay).await;
    }
}

/// `BACKOFF_BASE * 2^attempt`, capped at 2^6.
fn backoff(attempt: u32) -> Duration {
    BACKOFF_BASE * (1u32 << attempt.min(6))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(2), Duration::from_secs(2));
        assert_eq!(backoff(3), Duration::from_secs(4));
        assert_eq!(backoff(20), backoff(6));
    }
}
