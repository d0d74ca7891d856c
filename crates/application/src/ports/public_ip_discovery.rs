use async_trait::async_trait;
use ecs_forwarder_domain::DomainError;
use std::net::Ipv4Addr;

#[async_trait]
pub trait PublicIpDiscovery: Send + Sync {
    /// Public IPv4 address of this host as seen from the internet.
    async fn discover(&self) -> Result<Ipv4Addr, DomainError>;
}
