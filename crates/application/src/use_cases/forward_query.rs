use crate::ports::UpstreamResolver;
use crate::services::EcsInjector;
use ecs_forwarder_domain::DomainError;
use hickory_proto::op::Message;
use std::sync::Arc;
use tracing::debug;

/// Copy, tag with ECS, resolve upstream, restore the client's transaction ID.
pub struct ForwardQueryUseCase {
    resolver: Arc<dyn UpstreamResolver>,
    injector: EcsInjector,
}

impl ForwardQueryUseCase {
    pub fn new(resolver: Arc<dyn UpstreamResolver>, injector: EcsInjector) -> Self {
        Self { resolver, injector }
    }

    pub fn protocol_name(&self) -> &'static str {
        self.resolver.protocol_name()
    }

    pub fn injector(&self) -> &EcsInjector {
        &self.injector
    }

    pub async fn execute(&self, query: &Message) -> Result<Message, DomainError> {
        let forward = self.injector.inject(query);

        debug!(
            id = query.id(),
            upstream = self.resolver.protocol_name(),
            ecs = %self.injector.subnet(),
            "Forwarding query"
        );

        let mut response = self.resolver.resolve(&forward).await?;

        // The upstream exchange may use its own ID; the client only knows ours.
        response.set_id(query.id());
        Ok(response)
    }
}
