//! Webhook HTTP transport: one delivery attempt per call.
//!
//! Retry scheduling is NOT handled here; the dispatcher and the
//! background sweeper own the backoff schedule (see
//! `veris_core::delivery`). This module only executes a single POST with
//! a bounded timeout and classifies the result.

use std::time::Duration;

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for a failed delivery attempt.
///
/// Never surfaced to the producing service; it is recorded on the
/// event's delivery log and drives the retry state machine.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The underlying HTTP request failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// The callback returned a non-2xx status code.
    #[error("Callback returned HTTP {0}")]
    HttpStatus(u16),

    /// The callback did not respond within the per-call timeout.
    #[error("Callback timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout(REQUEST_TIMEOUT)
        } else {
            DeliveryError::Request(err)
        }
    }
}

impl DeliveryError {
    /// The HTTP status code seen on the wire, when there was one.
    pub fn response_code(&self) -> Option<u16> {
        match self {
            DeliveryError::Request(e) => e.status().map(|s| s.as_u16()),
            DeliveryError::HttpStatus(code) => Some(*code),
            DeliveryError::Timeout(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Posts event payloads to subscriber callback URLs.
pub struct WebhookDelivery {
    client: reqwest::Client,
}

impl WebhookDelivery {
    /// Create a new transport with a pre-configured HTTP client.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }

    /// Execute a single POST and check the response status.
    ///
    /// Returns the 2xx status code on success.
    pub async fn deliver(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<u16, DeliveryError> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::HttpStatus(status.as_u16()));
        }
        Ok(status.as_u16())
    }
}

impl Default for WebhookDelivery {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_does_not_panic() {
        let _transport = WebhookDelivery::new();
    }

    #[test]
    fn error_display_http_status() {
        let err = DeliveryError::HttpStatus(502);
        assert_eq!(err.to_string(), "Callback returned HTTP 502");
        assert_eq!(err.response_code(), Some(502));
    }

    #[test]
    fn error_display_request() {
        // Build a reqwest error from an invalid URL.
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = DeliveryError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
        assert_eq!(err.response_code(), None);
    }
}
