//! Outbound connection factory shared by both upstream transports.

use super::socks5;
use ecs_forwarder_domain::{split_host_port, DomainError};
use socket2::{SockRef, TcpKeepalive};
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(10);
const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialerOptions {
    pub connect_timeout: Duration,
    pub keepalive: Duration,
}

impl Default for DialerOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keepalive: DEFAULT_KEEPALIVE,
        }
    }
}

/// How outbound TCP connections reach the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialer {
    Direct(DialerOptions),
    Socks5 {
        proxy_host: String,
        proxy_port: u16,
        options: DialerOptions,
    },
}

/// Build a dialer from an optional SOCKS5 proxy address.
///
/// Accepts `host:port` or `[v6]:port`, optionally prefixed with `socks5://`
/// or `socks5h://`. An absent or blank address yields a direct dialer.
pub fn create_dialer(
    proxy_address: Option<&str>,
    options: DialerOptions,
) -> Result<Dialer, DomainError> {
    let Some(raw) = proxy_address.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Dialer::Direct(options));
    };

    let address = raw
        .strip_prefix("socks5h://")
        .or_else(|| raw.strip_prefix("socks5://"))
        .unwrap_or(raw)
        .trim_end_matches('/');

    match split_host_port(address) {
        Some((host, port)) if !host.is_empty() && port != 0 => Ok(Dialer::Socks5 {
            proxy_host: host.to_string(),
            proxy_port: port,
            options,
        }),
        _ => Err(DomainError::ConfigError(format!(
            "Invalid SOCKS5 proxy address '{}'. Expected 'HOST:PORT'",
            raw
        ))),
    }
}

impl Dialer {
    pub fn options(&self) -> DialerOptions {
        match self {
            Self::Direct(options) | Self::Socks5 { options, .. } => *options,
        }
    }

    pub fn is_proxied(&self) -> bool {
        matches!(self, Self::Socks5 { .. })
    }

    /// Proxy URL in the form reqwest expects; `socks5h` resolves names at the proxy.
    pub fn proxy_url(&self) -> Option<String> {
        match self {
            Self::Direct(_) => None,
            Self::Socks5 {
                proxy_host,
                proxy_port,
                ..
            } if proxy_host.contains(':') => {
                Some(format!("socks5h://[{}]:{}", proxy_host, proxy_port))
            }
            Self::Socks5 {
                proxy_host,
                proxy_port,
                ..
            } => Some(format!("socks5h://{}:{}", proxy_host, proxy_port)),
        }
    }

    /// TCP connection to `host:port`, through the proxy when one is set.
    pub async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, DomainError> {
        let options = self.options();

        let stream = match self {
            Self::Direct(_) => {
                tokio::time::timeout(options.connect_timeout, TcpStream::connect((host, port)))
                    .await
                    .map_err(|_| {
                        DomainError::DialError(format!(
                            "Timeout connecting to {}:{}",
                            host, port
                        ))
                    })?
                    .map_err(|e| {
                        DomainError::DialError(format!(
                            "Connection to {}:{} failed: {}",
                            host, port, e
                        ))
                    })?
            }
            Self::Socks5 {
                proxy_host,
                proxy_port,
                ..
            } => {
                socks5::connect_via_proxy(
                    proxy_host,
                    *proxy_port,
                    host,
                    port,
                    options.connect_timeout,
                )
                .await?
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        let keepalive = TcpKeepalive::new().with_time(options.keepalive);
        if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
            warn!(error = %e, host, port, "Failed to enable TCP keep-alive");
        }

        Ok(stream)
    }

    /// Pooled HTTPS client that dials the way this dialer does.
    pub fn http_client(&self, request_timeout: Duration) -> Result<reqwest::Client, DomainError> {
        self.http_client_builder(request_timeout)?
            .build()
            .map_err(|e| DomainError::ConfigError(format!("Failed to build HTTP client: {}", e)))
    }

    /// Builder behind [`Dialer::http_client`]: rustls with the bundled web
    /// roots, this dialer's timeouts, and its proxy or none.
    pub fn http_client_builder(
        &self,
        request_timeout: Duration,
    ) -> Result<reqwest::ClientBuilder, DomainError> {
        let options = self.options();
        let builder = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(options.connect_timeout)
            .tcp_keepalive(options.keepalive)
            .timeout(request_timeout)
            .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE_PER_HOST);

        let builder = match self.proxy_url() {
            Some(url) => {
                let proxy = reqwest::Proxy::all(&url).map_err(|e| {
                    DomainError::ConfigError(format!("Invalid proxy URL '{}': {}", url, e))
                })?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        Ok(builder)
    }
}

impl fmt::Display for Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.proxy_url() {
            Some(url) => write!(f, "{}", url),
            None => write!(f, "direct"),
        }
    }
}
