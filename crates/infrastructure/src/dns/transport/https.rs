//! DNS-over-HTTPS transport (RFC 8484)
//!
//! The wire-format query is the body of a POST to the configured URL:
//! ```text
//! POST /dns-query HTTP/1.1 or HTTP/2
//! Content-Type: application/dns-message
//! Accept: application/dns-message
//!
//! <raw DNS message bytes>
//! ```

use super::{decode_response, encode_query};
use async_trait::async_trait;
use ecs_forwarder_application::ports::UpstreamResolver;
use ecs_forwarder_domain::DomainError;
use hickory_proto::op::Message;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

pub struct HttpsTransport {
    url: Arc<str>,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpsTransport {
    /// `client` comes from the dialer so it already carries the proxy route.
    pub fn new(url: Arc<str>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            url,
            client,
            timeout,
        }
    }

    async fn exchange(&self, message_bytes: Vec<u8>) -> Result<Vec<u8>, DomainError> {
        let response = self
            .client
            .post(&*self.url)
            .header(reqwest::header::CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, DNS_MESSAGE_CONTENT_TYPE)
            .body(message_bytes)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::UpstreamStatusError {
                server: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        if body.is_empty() {
            return Err(DomainError::DecodeError(format!(
                "Empty DoH response body from {}",
                self.url
            )));
        }

        Ok(body.to_vec())
    }

    fn request_error(&self, e: reqwest::Error) -> DomainError {
        if e.is_timeout() {
            DomainError::TransportTimeout {
                server: self.url.to_string(),
            }
        } else if e.is_connect() {
            DomainError::DialError(format!("DoH connection to {} failed: {}", self.url, e))
        } else {
            DomainError::TransportIo(format!("DoH request to {} failed: {}", self.url, e))
        }
    }
}

#[async_trait]
impl UpstreamResolver for HttpsTransport {
    async fn resolve(&self, query: &Message) -> Result<Message, DomainError> {
        let message_bytes = encode_query(query)?;

        debug!(
            url = %self.url,
            message_len = message_bytes.len(),
            "Sending DoH query"
        );

        let response_bytes = tokio::time::timeout(self.timeout, self.exchange(message_bytes))
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.url.to_string(),
            })??;

        debug!(
            url = %self.url,
            response_len = response_bytes.len(),
            "DoH response received"
        );

        decode_response(&response_bytes, &self.url)
    }

    fn protocol_name(&self) -> &'static str {
        "HTTPS"
    }
}
