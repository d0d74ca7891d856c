use async_trait::async_trait;
use ecs_forwarder_domain::DomainError;
use hickory_proto::op::Message;

/// Turns one DNS query into one DNS response, whatever the upstream transport.
///
/// Implementations are built once at startup and shared by every request
/// handler, so they must be safe for concurrent use.
#[async_trait]
pub trait UpstreamResolver: Send + Sync {
    async fn resolve(&self, query: &Message) -> Result<Message, DomainError>;

    fn protocol_name(&self) -> &'static str;
}
