use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Local IP to listen on. Empty means the operator has not chosen one yet.
    #[serde(default)]
    pub bind_address: String,

    #[serde(default = "default_dns_port")]
    pub dns_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::new(),
            dns_port: default_dns_port(),
        }
    }
}

fn default_dns_port() -> u16 {
    53
}
