use super::answer_for;
use async_trait::async_trait;
use ecs_forwarder_application::ports::UpstreamResolver;
use ecs_forwarder_domain::DomainError;
use hickory_proto::op::Message;
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::Duration;

/// In-process upstream for listener tests.
pub struct MockUpstreamResolver {
    received: Mutex<Vec<Message>>,
    error: Option<DomainError>,
    extra_answers: usize,
    max_delay_ms: u64,
}

impl MockUpstreamResolver {
    pub fn new() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            error: None,
            extra_answers: 0,
            max_delay_ms: 0,
        }
    }

    pub fn failing(error: DomainError) -> Self {
        Self {
            error: Some(error),
            ..Self::new()
        }
    }

    /// Pad every answer with `count` additional A records.
    pub fn with_extra_answers(count: usize) -> Self {
        Self {
            extra_answers: count,
            ..Self::new()
        }
    }

    pub fn with_jitter(max_delay_ms: u64) -> Self {
        Self {
            max_delay_ms,
            ..Self::new()
        }
    }

    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
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

        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        // Upstream answers under its own transaction ID.
        let mut response = answer_for(query, query.id() ^ 0xFFFF);
        if let Some(question) = query.queries().first() {
            for i in 0..self.extra_answers {
                response.add_answer(Record::from_rdata(
                    question.name().clone(),
                    60,
                    RData::A(A(Ipv4Addr::new(192, 0, 2, (i % 250) as u8))),
                ));
            }
        }
        Ok(response)
    }

    fn protocol_name(&self) -> &'static str {
        "MOCK"
    }
}
