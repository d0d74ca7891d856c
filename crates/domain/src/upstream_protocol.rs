use crate::errors::DomainError;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Port used for DNS-over-TLS when the configured address has none (RFC 7858).
pub const DEFAULT_DOT_PORT: u16 = 853;

/// The single encrypted upstream the forwarder relays to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpstreamProtocol {
    Https { url: Arc<str>, hostname: Arc<str> },
    Tls { hostname: Arc<str>, port: u16 },
}

impl UpstreamProtocol {
    /// DoH upstream; only the `https://` scheme is accepted.
    pub fn https(url: &str) -> Result<Self, DomainError> {
        let url = url.trim();
        let rest = url.strip_prefix("https://").ok_or_else(|| {
            DomainError::ConfigError(format!("DoH URL '{}' must start with https://", url))
        })?;

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host_port = authority.rsplit('@').next().unwrap_or(authority);
        let hostname = match split_host_port(host_port) {
            Some((host, _)) => host,
            None => host_port.trim_start_matches('[').trim_end_matches(']'),
        };
        if hostname.is_empty() {
            return Err(DomainError::ConfigError(format!(
                "DoH URL '{}' has no host",
                url
            )));
        }

        Ok(Self::Https {
            url: url.into(),
            hostname: hostname.into(),
        })
    }

    /// DoT upstream from `host:port`, `[v6]:port`, a bare host or a bare IP.
    ///
    /// Without a port the whole address is the TLS server name and the port
    /// defaults to [`DEFAULT_DOT_PORT`].
    pub fn tls(address: &str) -> Result<Self, DomainError> {
        let address = address.trim();
        let address = address.strip_prefix("tls://").unwrap_or(address);
        if address.is_empty() {
            return Err(DomainError::ConfigError("DoT address is empty".to_string()));
        }

        let unbracketed = address.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = unbracketed.parse::<IpAddr>() {
            return Ok(Self::Tls {
                hostname: ip.to_string().into(),
                port: DEFAULT_DOT_PORT,
            });
        }

        if let Some((host, port)) = split_host_port(address) {
            if host.is_empty() {
                return Err(DomainError::ConfigError(format!(
                    "DoT address '{}' has no host",
                    address
                )));
            }
            return Ok(Self::Tls {
                hostname: host.into(),
                port,
            });
        }

        if address.contains(':') || address.contains(char::is_whitespace) {
            return Err(DomainError::ConfigError(format!(
                "Invalid DoT address '{}'. Expected 'HOST:PORT' or 'HOST'",
                address
            )));
        }

        Ok(Self::Tls {
            hostname: address.into(),
            port: DEFAULT_DOT_PORT,
        })
    }

    /// Exactly one of the two selectors must be set; empty strings count as unset.
    pub fn from_selection(
        doh_url: Option<&str>,
        dot_address: Option<&str>,
    ) -> Result<Self, DomainError> {
        let doh_url = doh_url.map(str::trim).filter(|s| !s.is_empty());
        let dot_address = dot_address.map(str::trim).filter(|s| !s.is_empty());

        match (doh_url, dot_address) {
            (Some(url), None) => Self::https(url),
            (None, Some(address)) => Self::tls(address),
            (Some(_), Some(_)) => Err(DomainError::ConfigError(
                "Both a DoH URL and a DoT address are configured, choose exactly one".to_string(),
            )),
            (None, None) => Err(DomainError::ConfigError(
                "A DoH URL or a DoT address must be configured".to_string(),
            )),
        }
    }

    pub fn hostname(&self) -> &str {
        match self {
            Self::Https { hostname, .. } | Self::Tls { hostname, .. } => hostname,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Https { .. } => "HTTPS",
            Self::Tls { .. } => "TLS",
        }
    }
}

impl fmt::Display for UpstreamProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Https { url, .. } => write!(f, "{}", url),
            Self::Tls { hostname, port } if hostname.contains(':') => {
                write!(f, "tls://[{}]:{}", hostname, port)
            }
            Self::Tls { hostname, port } => write!(f, "tls://{}:{}", hostname, port),
        }
    }
}

/// Split `host:port` or `[v6]:port`. Returns `None` when no valid port is present.
pub fn split_host_port(s: &str) -> Option<(&str, u16)> {
    if s.starts_with('[') {
        let end = s.find(']')?;
        let host = &s[1..end];
        let rest = &s[end + 1..];
        let port_str = rest.strip_prefix(':')?;
        let port = port_str.parse::<u16>().ok()?;
        Some((host, port))
    } else {
        let (host, port_str) = s.rsplit_once(':')?;
        if host.contains(':') {
            return None;
        }
        let port = port_str.parse::<u16>().ok()?;
        Some((host, port))
    }
}
