pub mod dialer;
#[cfg(feature = "dns-over-https")]
pub mod https;
pub mod socks5;
pub mod tcp;
#[cfg(feature = "dns-over-rustls")]
pub mod tls;

use async_trait::async_trait;
use ecs_forwarder_application::ports::UpstreamResolver;
use ecs_forwarder_application::services::encode_message;
use ecs_forwarder_domain::{DomainError, UpstreamProtocol};
use hickory_proto::op::Message;
use std::sync::Arc;
use std::time::Duration;

pub use dialer::{create_dialer, Dialer, DialerOptions};
#[cfg(feature = "dns-over-rustls")]
pub use tls::install_crypto_provider;

/// The configured upstream. Chosen once at startup, never switched per query.
pub enum Transport {
    #[cfg(feature = "dns-over-rustls")]
    Tls(tls::TlsTransport),
    #[cfg(feature = "dns-over-https")]
    Https(https::HttpsTransport),
}

#[async_trait]
impl UpstreamResolver for Transport {
    async fn resolve(&self, query: &Message) -> Result<Message, DomainError> {
        match self {
            #[cfg(feature = "dns-over-rustls")]
            Self::Tls(t) => t.resolve(query).await,
            #[cfg(feature = "dns-over-https")]
            Self::Https(t) => t.resolve(query).await,
        }
    }

    fn protocol_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "dns-over-rustls")]
            Self::Tls(_) => "TLS",
            #[cfg(feature = "dns-over-https")]
            Self::Https(_) => "HTTPS",
        }
    }
}

pub fn create_transport(
    protocol: &UpstreamProtocol,
    dialer: Arc<Dialer>,
    query_timeout: Duration,
) -> Result<Transport, DomainError> {
    match protocol {
        #[cfg(feature = "dns-over-rustls")]
        UpstreamProtocol::Tls { hostname, port } => Ok(Transport::Tls(tls::TlsTransport::new(
            hostname.clone(),
            *port,
            dialer,
            query_timeout,
        ))),

        #[cfg(not(feature = "dns-over-rustls"))]
        UpstreamProtocol::Tls { .. } => Err(DomainError::ConfigError(format!(
            "TLS feature not enabled. Enable 'dns-over-rustls' feature to use: {}",
            protocol
        ))),

        #[cfg(feature = "dns-over-https")]
        UpstreamProtocol::Https { url, .. } => Ok(Transport::Https(https::HttpsTransport::new(
            url.clone(),
            dialer.http_client(query_timeout)?,
            query_timeout,
        ))),

        #[cfg(not(feature = "dns-over-https"))]
        UpstreamProtocol::Https { url, .. } => Err(DomainError::ConfigError(format!(
            "HTTPS feature not enabled. Enable 'dns-over-https' feature to use: {}",
            url
        ))),
    }
}

/// Build the resolver the forwarding use case depends on.
pub fn create_resolver(
    protocol: &UpstreamProtocol,
    dialer: Arc<Dialer>,
    query_timeout: Duration,
) -> Result<Arc<dyn UpstreamResolver>, DomainError> {
    Ok(Arc::new(create_transport(protocol, dialer, query_timeout)?))
}

pub(crate) fn encode_query(query: &Message) -> Result<Vec<u8>, DomainError> {
    encode_message(query).map_err(|e| DomainError::EncodeError(e.to_string()))
}

pub(crate) fn decode_response(bytes: &[u8], server: &str) -> Result<Message, DomainError> {
    if bytes.is_empty() {
        return Err(DomainError::DecodeError(format!(
            "Empty response from {}",
            server
        )));
    }
    Message::from_vec(bytes)
        .map_err(|e| DomainError::DecodeError(format!("Malformed response from {}: {}", server, e)))
}
