use ecs_forwarder_application::services::EcsInjector;
use ecs_forwarder_application::use_cases::{DetermineEcsSubnetUseCase, ForwardQueryUseCase};
use ecs_forwarder_domain::{Config, EcsSubnet, UpstreamProtocol};
use ecs_forwarder_infrastructure::dns::transport::{
    create_dialer, create_resolver, install_crypto_provider, DialerOptions,
};
use ecs_forwarder_infrastructure::public_ip::HttpPublicIpDiscovery;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything the listener needs, computed once before it binds.
pub struct ForwardingServices {
    pub forward_query: Arc<ForwardQueryUseCase>,
    pub upstream: UpstreamProtocol,
    pub ecs_subnet: EcsSubnet,
}

impl ForwardingServices {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        install_crypto_provider();

        let upstream = config.upstream_protocol()?;
        let options = DialerOptions {
            connect_timeout: Duration::from_secs(config.upstream.connect_timeout),
            keepalive: Duration::from_secs(config.upstream.keepalive),
        };
        let dialer = Arc::new(create_dialer(
            config.upstream.socks5_proxy.as_deref(),
            options,
        )?);

        let query_timeout = Duration::from_secs(config.upstream.query_timeout);
        let resolver = create_resolver(&upstream, dialer.clone(), query_timeout)?;

        let discovery = Arc::new(HttpPublicIpDiscovery::new(
            config.ecs.public_ip_service.clone(),
        )?);
        let ecs_subnet = DetermineEcsSubnetUseCase::new(discovery)
            .execute(config.ecs.source.as_deref())
            .await?;

        info!(
            upstream = %upstream,
            protocol = upstream.protocol_name(),
            sni = upstream.hostname(),
            via = %dialer,
            proxied = dialer.is_proxied(),
            ecs = %ecs_subnet,
            "Forwarding services initialized"
        );

        let forward_query = Arc::new(ForwardQueryUseCase::new(
            resolver,
            EcsInjector::new(ecs_subnet),
        ));

        Ok(Self {
            forward_query,
            upstream,
            ecs_subnet,
        })
    }
}
