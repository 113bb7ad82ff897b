//! Outbound transport.
//!
//! The composer hands a fully built request to an [`EventSender`] and only
//! looks at what comes back: a status and body, or a transport failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};

use crate::error::TransportError;

/// A signed webhook ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Exact bytes covered by the signature.
    pub body: Vec<u8>,
}

impl OutboundRequest {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response from the counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub status: u16,
    pub body: String,
}

/// Transport used to deliver outbound webhooks.
#[async_trait]
pub trait EventSender: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<DeliveryResponse, TransportError>;
}

/// HTTP transport backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: Client,
    timeout: Duration,
}

impl HttpSender {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl EventSender for HttpSender {
    async fn send(&self, request: OutboundRequest) -> Result<DeliveryResponse, TransportError> {
        info!(
            url = %request.url,
            body_length = request.body.len(),
            timeout_seconds = self.timeout.as_secs_f64(),
            "outbound_post_starting"
        );

        let mut builder = self.client.post(&request.url).timeout(self.timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = match builder.body(request.body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_timeout() {
                    error!(
                        url = %request.url,
                        timeout_seconds = self.timeout.as_secs_f64(),
                        error = %e,
                        "outbound_post_timeout"
                    );
                } else {
                    error!(url = %request.url, error = %e, "outbound_post_error");
                }
                return Err(TransportError::from(e));
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        info!(url = %request.url, status_code = status, "outbound_post_complete");

        Ok(DeliveryResponse { status, body })
    }
}
