use crate::errors::DomainError;
use ipnetwork::IpNetwork;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Source prefix used when the ECS source is a bare address.
pub const DEFAULT_ECS_PREFIX_LEN: u8 = 24;

/// Client subnet attached to every forwarded query.
///
/// Computed once at startup and shared read-only afterwards. Only IPv4 is
/// carried because forwarded options are always emitted with family 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EcsSubnet {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl EcsSubnet {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self, DomainError> {
        if prefix_len > 32 {
            return Err(DomainError::ConfigError(format!(
                "ECS prefix length {} exceeds 32",
                prefix_len
            )));
        }
        Ok(Self {
            address,
            prefix_len,
        })
    }

    /// Subnet derived from an auto-detected public address.
    pub fn from_public_ip(address: Ipv4Addr) -> Self {
        Self {
            address,
            prefix_len: DEFAULT_ECS_PREFIX_LEN,
        }
    }

    /// Parse an operator-supplied ECS source.
    ///
    /// CIDR notation wins and yields the network address with its prefix;
    /// a bare address gets [`DEFAULT_ECS_PREFIX_LEN`].
    pub fn parse(source: &str) -> Result<Self, DomainError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(DomainError::ConfigError("ECS source is empty".to_string()));
        }

        if source.contains('/') {
            let network: IpNetwork = source.parse().map_err(|e| {
                DomainError::ConfigError(format!("Invalid ECS CIDR '{}': {}", source, e))
            })?;
            return match network {
                IpNetwork::V4(v4) => Self::new(v4.network(), v4.prefix()),
                IpNetwork::V6(_) => Err(DomainError::ConfigError(format!(
                    "ECS source '{}' is IPv6, only IPv4 subnets are supported",
                    source
                ))),
            };
        }

        match source.parse::<IpAddr>() {
            Ok(IpAddr::V4(address)) => Ok(Self::from_public_ip(address)),
            Ok(IpAddr::V6(_)) => Err(DomainError::ConfigError(format!(
                "ECS source '{}' is IPv6, only IPv4 subnets are supported",
                source
            ))),
            Err(_) => Err(DomainError::ConfigError(format!(
                "Invalid ECS format '{}', expected an IP (8.8.8.8) or CIDR (8.8.8.0/24)",
                source
            ))),
        }
    }
}

impl fmt::Display for EcsSubnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}
