use serde::{Deserialize, Serialize};

/// Upstream used when neither a DoH URL nor a DoT address is configured.
pub const DEFAULT_DOH_URL: &str = "https://doh.pub/dns-query";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub doh_url: Option<String>,

    #[serde(default)]
    pub dot_address: Option<String>,

    /// SOCKS5 proxy (`host:port`) applied to whichever upstream is selected.
    #[serde(default)]
    pub socks5_proxy: Option<String>,

    /// Seconds allowed for one complete upstream exchange.
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,

    /// Seconds allowed to establish an outbound TCP connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// TCP keep-alive interval in seconds for outbound connections.
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            doh_url: None,
            dot_address: None,
            socks5_proxy: None,
            query_timeout: default_query_timeout(),
            connect_timeout: default_connect_timeout(),
            keepalive: default_keepalive(),
        }
    }
}

fn default_query_timeout() -> u64 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_keepalive() -> u64 {
    10
}
