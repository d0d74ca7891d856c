use ecs_forwarder_application::services::{encode_message, FORWARD_EDNS_PAYLOAD};
use ecs_forwarder_domain::DomainError;
use hickory_proto::op::{Edns, Message, MessageType, ResponseCode};

/// Largest UDP response a client without EDNS0 accepts (RFC 1035 §2.3.4).
pub const MIN_UDP_PAYLOAD: usize = 512;

/// Error response echoing the query's ID, opcode, RD flag and question.
pub fn build_error_response(query: &Message, code: ResponseCode) -> Message {
    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(query.op_code())
        .set_recursion_desired(query.recursion_desired())
        .set_recursion_available(true)
        .set_checking_disabled(query.checking_disabled())
        .set_response_code(code);
    response.add_queries(query.queries().to_vec());

    if query.extensions().is_some() {
        let mut edns = Edns::new();
        edns.set_max_payload(FORWARD_EDNS_PAYLOAD);
        response.set_edns(edns);
    }
    response
}

pub fn build_servfail(query: &Message) -> Message {
    build_error_response(query, ResponseCode::ServFail)
}

/// FORMERR for a query that could not be decoded, built straight from the
/// raw header bytes. `None` when there are not even two bytes of ID, or when
/// the QR bit marks the datagram as a response.
pub fn build_formerr(query_buf: &[u8]) -> Option<[u8; 12]> {
    if query_buf.len() < 2 {
        return None;
    }

    let flags = query_buf.get(2).copied().unwrap_or(0);
    if flags & 0x80 != 0 {
        return None;
    }
    let mut buf = [0u8; 12];
    buf[0] = query_buf[0];
    buf[1] = query_buf[1];
    // QR=1, keep OPCODE (0x78) and RD (0x01)
    buf[2] = 0x80 | (flags & 0x79);
    // RA=1, RCODE=FORMERR
    buf[3] = 0x80 | ResponseCode::FormErr.low();
    Some(buf)
}

/// Payload size the client is willing to receive over UDP.
pub fn client_udp_limit(query: &Message) -> usize {
    match query.extensions() {
        Some(edns) => (edns.max_payload() as usize).max(MIN_UDP_PAYLOAD),
        None => MIN_UDP_PAYLOAD,
    }
}

/// Serialize `response` for a UDP client. When it does not fit in
/// `max_size`, only the header, question and OPT record are sent with TC
/// set so the client retries over TCP.
pub fn encode_for_udp(response: &Message, max_size: usize) -> Result<Vec<u8>, DomainError> {
    let bytes = encode(response)?;
    if bytes.len() <= max_size {
        return Ok(bytes);
    }

    let mut truncated = Message::new();
    truncated.set_header(*response.header());
    truncated.set_truncated(true);
    truncated.add_queries(response.queries().to_vec());
    if let Some(edns) = response.extensions() {
        truncated.set_edns(edns.clone());
    }
    encode(&truncated)
}

pub fn encode(message: &Message) -> Result<Vec<u8>, DomainError> {
    encode_message(message).map_err(|e| DomainError::EncodeError(e.to_string()))
}
