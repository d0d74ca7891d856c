use super::answer_address;
use async_trait::async_trait;
use ecs_forwarder_application::ports::{PublicIpDiscovery, UpstreamResolver};
use ecs_forwarder_domain::DomainError;
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Answers every query with one A record derived from the query ID, using a
/// different transaction ID on the way back like a real upstream may.
pub struct MockUpstreamResolver {
    received: Mutex<Vec<Message>>,
    error: Mutex<Option<DomainError>>,
    max_delay_ms: u64,
}

impl MockUpstreamResolver {
    pub fn new() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            error: Mutex::new(None),
            max_delay_ms: 0,
        }
    }

    /// Sleep a random 0..=max_delay_ms before answering.
    pub fn with_jitter(max_delay_ms: u64) -> Self {
        Self {
            max_delay_ms,
            ..Self::new()
        }
    }

    pub fn failing(error: DomainError) -> Self {
        let resolver = Self::new();
        *resolver.error.lock().unwrap() = Some(error);
        resolver
    }

    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }

    pub fn response_for(query: &Message) -> Message {
        let mut response = Message::new();
        response
            .set_id(query.id().wrapping_add(0x5a5a))
            .set_message_type(MessageType::Response)
            .set_op_code(query.op_code())
            .set_recursion_desired(query.recursion_desired())
            .set_recursion_available(true)
            .set_response_code(ResponseCode::NoError);
        response.add_queries(query.queries().to_vec());
        if let Some(question) = query.queries().first() {
            response.add_answer(Record::from_rdata(
                question.name().clone(),
                60,
                RData::A(A(answer_address(query.id()))),
            ));
        }
        response
    }
}

impl Default for MockUpstreamResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamResolver for MockUpstreamResolver {
    async fn resolve(&self, query: &Message) -> Result<Message, DomainError> {
        self.received.lock().unwrap().push(query.clone());

        if self.max_delay_ms > 0 {
            let delay = fastrand::u64(0..=self.max_delay_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if let Some(err) = self.error.lock().unwrap().clone() {
            return Err(err);
        }

        Ok(Self::response_for(query))
    }

    fn protocol_name(&self) -> &'static str {
        "MOCK"
    }
}

pub struct MockPublicIpDiscovery {
    result: Result<Ipv4Addr, DomainError>,
    calls: AtomicUsize,
}

impl MockPublicIpDiscovery {
    pub fn returning(address: Ipv4Addr) -> Self {
        Self {
            result: Ok(address),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: DomainError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublicIpDiscovery for MockPublicIpDiscovery {
    async fn discover(&self) -> Result<Ipv4Addr, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
