//! DNS-over-TLS transport (RFC 7858).
//!
//! Every query gets its own connection: dial (directly or through SOCKS5),
//! TLS handshake with the configured server name, one length-prefixed
//! message each way, close.

use super::tcp::{read_with_length_prefix, send_with_length_prefix};
use super::{decode_response, encode_query, Dialer};
use async_trait::async_trait;
use ecs_forwarder_application::ports::UpstreamResolver;
use ecs_forwarder_domain::DomainError;
use hickory_proto::op::Message;
use rustls::pki_types::ServerName;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;

/// Client config with the webpki root store, built once.
static SHARED_TLS_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    install_crypto_provider();

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
});

/// reqwest and tokio-rustls enable different rustls backends; pick one for
/// the whole process before any config is built.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub struct TlsTransport {
    hostname: Arc<str>,
    port: u16,
    dialer: Arc<Dialer>,
    timeout: Duration,
    client_config: Arc<rustls::ClientConfig>,
}

impl TlsTransport {
    pub fn new(hostname: Arc<str>, port: u16, dialer: Arc<Dialer>, timeout: Duration) -> Self {
        Self {
            hostname,
            port,
            dialer,
            timeout,
            client_config: SHARED_TLS_CONFIG.clone(),
        }
    }

    /// Replace the default webpki trust store, e.g. to trust a private CA.
    pub fn with_client_config(mut self, client_config: Arc<rustls::ClientConfig>) -> Self {
        self.client_config = client_config;
        self
    }

    fn server(&self) -> String {
        if self.hostname.contains(':') {
            format!("[{}]:{}", self.hostname, self.port)
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }

    async fn exchange(&self, message_bytes: &[u8]) -> Result<Vec<u8>, DomainError> {
        let server_name = ServerName::try_from(self.hostname.to_string()).map_err(|e| {
            DomainError::HandshakeError(format!(
                "Invalid TLS server name '{}': {}",
                self.hostname, e
            ))
        })?;

        let tcp_stream = self.dialer.connect(&self.hostname, self.port).await?;

        let connector = tokio_rustls::TlsConnector::from(self.client_config.clone());
        let mut tls_stream = connector
            .connect(server_name, tcp_stream)
            .await
            .map_err(|e| {
                DomainError::HandshakeError(format!(
                    "TLS handshake with {} failed: {}",
                    self.server(),
                    e
                ))
            })?;

        debug!(server = %self.server(), via = %self.dialer, "TLS session established");

        send_with_length_prefix(&mut tls_stream, message_bytes).await?;
        read_with_length_prefix(&mut tls_stream).await
        // tls_stream dropped here: the connection never outlives the exchange.
    }
}

#[async_trait]
impl UpstreamResolver for TlsTransport {
    async fn resolve(&self, query: &Message) -> Result<Message, DomainError> {
        let message_bytes = encode_query(query)?;

        let response_bytes = tokio::time::timeout(self.timeout, self.exchange(&message_bytes))
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.server(),
            })??;

        let response = decode_response(&response_bytes, &self.server())?;

        if response.truncated() {
            return Err(DomainError::DecodeError(format!(
                "Truncated response from {} over TLS",
                self.server()
            )));
        }
        if response.id() != query.id() {
            return Err(DomainError::IdMismatchError {
                server: self.server(),
                expected: query.id(),
                received: response.id(),
            });
        }

        debug!(
            server = %self.server(),
            response_len = response_bytes.len(),
            "TLS response received"
        );
        Ok(response)
    }

    fn protocol_name(&self) -> &'static str {
        "TLS"
    }
}
