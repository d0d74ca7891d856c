use ecs_forwarder_domain::EcsSubnet;
use hickory_proto::op::{Edns, Message};
use hickory_proto::rr::rdata::opt::{ClientSubnet, EdnsCode, EdnsOption};
use std::net::IpAddr;

/// UDP payload size advertised on an OPT record created for a forwarded query.
pub const FORWARD_EDNS_PAYLOAD: u16 = 1232;

/// Writes the server-wide client subnet into forwarded queries.
///
/// The subnet is fixed at construction; the client's own address is never
/// consulted.
#[derive(Debug, Clone, Copy)]
pub struct EcsInjector {
    subnet: EcsSubnet,
}

impl EcsInjector {
    pub fn new(subnet: EcsSubnet) -> Self {
        Self { subnet }
    }

    pub fn subnet(&self) -> EcsSubnet {
        self.subnet
    }

    /// Copy of `query` carrying the configured Client Subnet option.
    /// `query` itself is left untouched.
    pub fn inject(&self, query: &Message) -> Message {
        let mut forward = query.clone();
        self.apply(&mut forward);
        forward
    }

    /// Set the Client Subnet option on `message` in place, creating the OPT
    /// record if the message has none. An existing subnet option is replaced.
    pub fn apply(&self, message: &mut Message) {
        let edns = message.extensions_mut().get_or_insert_with(|| {
            let mut edns = Edns::new();
            edns.set_max_payload(FORWARD_EDNS_PAYLOAD);
            edns
        });

        // Options are keyed by code: at most one subnet option per message.
        let options = edns.options_mut();
        options.remove(EdnsCode::Subnet);
        options.insert(EdnsOption::Subnet(self.client_subnet()));
    }

    fn client_subnet(&self) -> ClientSubnet {
        ClientSubnet::new(IpAddr::V4(self.subnet.address), self.subnet.prefix_len, 0)
    }
}
