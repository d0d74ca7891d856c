use serde::{Deserialize, Serialize};

pub const DEFAULT_PUBLIC_IP_SERVICE: &str = "https://api.ipify.org";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EcsConfig {
    /// Explicit client subnet, as an IP (`8.8.8.8`) or CIDR (`8.8.8.0/24`).
    /// When unset the public address is detected at startup.
    #[serde(default)]
    pub source: Option<String>,

    /// Plain-text "what is my IP" endpoint used for auto-detection.
    #[serde(default = "default_public_ip_service")]
    pub public_ip_service: String,
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            source: None,
            public_ip_service: default_public_ip_service(),
        }
    }
}

fn default_public_ip_service() -> String {
    DEFAULT_PUBLIC_IP_SERVICE.to_string()
}
