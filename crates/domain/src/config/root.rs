use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use super::ecs::EcsConfig;
use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::server::ServerConfig;
use super::upstream::{UpstreamConfig, DEFAULT_DOH_URL};
use crate::ecs_subnet::EcsSubnet;
use crate::upstream_protocol::UpstreamProtocol;

const LOCAL_CONFIG_PATH: &str = "ecs-forwarder.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/ecs-forwarder/config.toml";

/// Main configuration structure for the forwarder
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Listener configuration (bind address, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream selection, proxy and timeouts
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// EDNS Client Subnet source
    #[serde(default)]
    pub ecs: EcsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. ecs-forwarder.toml in current directory
    /// 3. /etc/ecs-forwarder/config.toml
    /// 4. Default configuration
    ///
    /// Command-line overrides are applied last.
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new(LOCAL_CONFIG_PATH).exists() {
            Self::from_file(LOCAL_CONFIG_PATH)?
        } else if std::path::Path::new(SYSTEM_CONFIG_PATH).exists() {
            Self::from_file(SYSTEM_CONFIG_PATH)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        config.normalize_upstream();
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if let Some(port) = overrides.dns_port {
            self.server.dns_port = port;
        }
        // Choosing an upstream on the command line replaces the file's choice.
        if overrides.doh_url.is_some() || overrides.dot_address.is_some() {
            self.upstream.doh_url = overrides.doh_url;
            self.upstream.dot_address = overrides.dot_address;
        }
        if let Some(proxy) = overrides.socks5_proxy {
            self.upstream.socks5_proxy = Some(proxy);
        }
        if let Some(source) = overrides.ecs_source {
            self.ecs.source = Some(source);
        }
        if let Some(service) = overrides.public_ip_service {
            self.ecs.public_ip_service = service;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Treat blank strings as unset and fall back to the default DoH upstream
    /// when no upstream was chosen at all.
    pub fn normalize_upstream(&mut self) {
        fn blank_to_none(value: &mut Option<String>) {
            if value.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *value = None;
            }
        }

        blank_to_none(&mut self.upstream.doh_url);
        blank_to_none(&mut self.upstream.dot_address);
        blank_to_none(&mut self.upstream.socks5_proxy);
        blank_to_none(&mut self.ecs.source);

        if self.upstream.doh_url.is_none() && self.upstream.dot_address.is_none() {
            self.upstream.doh_url = Some(DEFAULT_DOH_URL.to_string());
        }
    }

    /// Validate configuration before anything binds or dials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.dns_port == 0 {
            return Err(ConfigError::Validation("DNS port cannot be 0".to_string()));
        }

        self.listen_addr()?;
        self.upstream_protocol()?;

        if let Some(source) = &self.ecs.source {
            EcsSubnet::parse(source).map_err(|e| ConfigError::Validation(e.to_string()))?;
        } else if self.ecs.public_ip_service.trim().is_empty() {
            return Err(ConfigError::Validation(
                "No ECS source and no public IP service configured".to_string(),
            ));
        }

        if self.upstream.query_timeout == 0 || self.upstream.connect_timeout == 0 {
            return Err(ConfigError::Validation(
                "Upstream timeouts must be greater than 0".to_string(),
            ));
        }

        if self.upstream.keepalive == 0 {
            return Err(ConfigError::Validation(
                "Upstream keepalive must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn upstream_protocol(&self) -> Result<UpstreamProtocol, ConfigError> {
        UpstreamProtocol::from_selection(
            self.upstream.doh_url.as_deref(),
            self.upstream.dot_address.as_deref(),
        )
        .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.server.bind_address.trim();
        if bind.is_empty() {
            return Err(ConfigError::Validation(
                "No bind address configured".to_string(),
            ));
        }
        let ip: IpAddr = bind
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Invalid bind address '{}'", bind)))?;
        Ok(SocketAddr::new(ip, self.server.dns_port))
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub bind_address: Option<String>,
    pub dns_port: Option<u16>,
    pub doh_url: Option<String>,
    pub dot_address: Option<String>,
    pub socks5_proxy: Option<String>,
    pub ecs_source: Option<String>,
    pub public_ip_service: Option<String>,
    pub log_level: Option<String>,
}
