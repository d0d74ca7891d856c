use crate::ports::PublicIpDiscovery;
use ecs_forwarder_domain::{DomainError, EcsSubnet};
use std::sync::Arc;
use tracing::info;

/// Computes the server-wide client subnet once, before the listeners start.
pub struct DetermineEcsSubnetUseCase {
    discovery: Arc<dyn PublicIpDiscovery>,
}

impl DetermineEcsSubnetUseCase {
    pub fn new(discovery: Arc<dyn PublicIpDiscovery>) -> Self {
        Self { discovery }
    }

    /// An explicit `source` is parsed as CIDR or bare IP. Without one the
    /// public address is discovered. Every failure is a configuration error.
    pub async fn execute(&self, source: Option<&str>) -> Result<EcsSubnet, DomainError> {
        if let Some(source) = source.map(str::trim).filter(|s| !s.is_empty()) {
            let subnet = EcsSubnet::parse(source)?;
            info!(source = %source, ecs = %subnet, "Using configured ECS");
            return Ok(subnet);
        }

        info!("Detecting public IP for ECS");
        let address = self.discovery.discover().await.map_err(|e| {
            DomainError::ConfigError(format!("Public IP auto-detection failed: {}", e))
        })?;

        let subnet = EcsSubnet::from_public_ip(address);
        info!(public_ip = %address, ecs = %subnet, "Public IP detected");
        Ok(subnet)
    }
}
