use async_trait::async_trait;
use ecs_forwarder_application::ports::PublicIpDiscovery;
use ecs_forwarder_domain::DomainError;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Asks a plain-text "what is my IP" service (one dotted quad in the body).
pub struct HttpPublicIpDiscovery {
    service_url: String,
    client: reqwest::Client,
}

impl HttpPublicIpDiscovery {
    pub fn new(service_url: impl Into<String>) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(LOOKUP_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| DomainError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            service_url: service_url.into(),
            client,
        })
    }
}

#[async_trait]
impl PublicIpDiscovery for HttpPublicIpDiscovery {
    async fn discover(&self) -> Result<Ipv4Addr, DomainError> {
        let response = self
            .client
            .get(&self.service_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DomainError::TransportTimeout {
                        server: self.service_url.clone(),
                    }
                } else {
                    DomainError::TransportIo(format!(
                        "Request to {} failed: {}",
                        self.service_url, e
                    ))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::UpstreamStatusError {
                server: self.service_url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            DomainError::TransportIo(format!(
                "Failed to read response from {}: {}",
                self.service_url, e
            ))
        })?;

        let text = body.trim();
        debug!(service = %self.service_url, body = %text, "Public IP service answered");

        text.parse::<Ipv4Addr>().map_err(|_| {
            DomainError::DecodeError(format!(
                "'{}' from {} is not an IPv4 address",
                text, self.service_url
            ))
        })
    }
}
