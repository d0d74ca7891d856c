mod public_ip_discovery;
mod upstream_resolver;

pub use public_ip_discovery::PublicIpDiscovery;
pub use upstream_resolver::UpstreamResolver;
