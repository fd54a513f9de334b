//! Delivery of the response document to the pre-signed callback URL.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::config::CallbackConfig;
use crate::error::{InitializerError, InitializerResult};

/// One failed delivery attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct TransportFailure {
    /// Whether another attempt could succeed
    pub retryable: bool,
    pub reason: String,
}

impl TransportFailure {
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self {
            retryable: true,
            reason: reason.into(),
        }
    }

    pub fn terminal(reason: impl Into<String>) -> Self {
        Self {
            retryable: false,
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait CallbackTransport: Send + Sync {
    async fn deliver(&self, url: &str, body: Vec<u8>) -> Result<(), TransportFailure>;

    fn transport_name(&self) -> &'static str {
        "callback_transport"
    }
}

/// HTTP PUT to the pre-signed URL
///
/// The URL signature covers an empty content type, so the header is sent empty.
#[derive(Debug, Clone)]
pub struct HttpCallbackTransport {
    client: Client,
}

impl HttpCallbackTransport {
    pub fn new(timeout: Duration) -> InitializerResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            InitializerError::reporting_failure("-", format!("failed to create HTTP client: {e}"))
        })?;
        Ok(Self { client })
    }

    pub fn from_config(config: &CallbackConfig) -> InitializerResult<Self> {
        Self::new(Duration::from_millis(config.timeout_ms))
    }
}

#[async_trait]
impl CallbackTransport for HttpCallbackTransport {
    async fn deliver(&self, url: &str, body: Vec<u8>) -> Result<(), TransportFailure> {
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                // A malformed URL will not get better on retry
                if e.is_builder() {
                    TransportFailure::terminal(format!("invalid callback URL: {e}"))
                } else {
                    TransportFailure::retryable(format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let reason = format!("HTTP {}: {}", status, error_text.trim());

        // Don't retry client errors (4xx): an expired or tampered URL stays that way
        if status.is_client_error() {
            Err(TransportFailure::terminal(reason))
        } else {
            Err(TransportFailure::retryable(reason))
        }
    }

    fn transport_name(&self) -> &'static str {
        "http_put"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_put_with_empty_content_type() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/signed")
            .match_query(Matcher::Any)
            .match_header("content-type", "")
            .match_body(r#"{"Status":"SUCCESS"}"#)
            .with_status(200)
            .create_async()
            .await;

        let transport = HttpCallbackTransport::new(Duration::from_secs(2)).unwrap();
        transport
            .deliver(
                &format!("{}/signed?X-Amz-Signature=abc", server.url()),
                br#"{"Status":"SUCCESS"}"#.to_vec(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_classification() {
        let mut server = Server::new_async().await;
        let _forbidden = server
            .mock("PUT", "/expired")
            .with_status(403)
            .with_body("Request has expired")
            .create_async()
            .await;
        let _unavailable = server
            .mock("PUT", "/busy")
            .with_status(503)
            .create_async()
            .await;

        let transport = HttpCallbackTransport::new(Duration::from_secs(2)).unwrap();

        let err = transport
            .deliver(&format!("{}/expired", server.url()), Vec::new())
            .await
            .unwrap_err();
        assert!(!err.retryable);
        assert!(err.reason.contains("403"));

        let err = transport
            .deliver(&format!("{}/busy", server.url()), Vec::new())
            .await
            .unwrap_err();
        assert!(err.retryable);
    }

    #[tokio::test]
    async fn test_invalid_url_is_terminal() {
        let transport = HttpCallbackTransport::new(Duration::from_secs(1)).unwrap();
        let err = transport.deliver("not a url", Vec::new()).await.unwrap_err();
        assert!(!err.retryable);
    }
}
