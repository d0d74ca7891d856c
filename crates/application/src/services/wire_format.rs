use hickory_proto::error::ProtoResult;
use hickory_proto::op::Message;
use hickory_proto::rr::rdata::opt::{EdnsCode, EdnsOption, OPT};
use hickory_proto::rr::rdata::NULL;
use hickory_proto::rr::{RData, Record, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use std::collections::HashMap;

/// Encode `message` with its EDNS options in ascending option-code order.
///
/// `Message::to_vec` writes OPT options in hash-map order, which differs
/// between two decodes of the same bytes. Every message leaving the process
/// goes through here instead.
pub fn encode_message(message: &Message) -> ProtoResult<Vec<u8>> {
    let Some(edns) = message.extensions() else {
        return message.to_vec();
    };
    if edns.options().as_ref().len() < 2 {
        return message.to_vec();
    }

    let mut options: Vec<(&EdnsCode, &EdnsOption)> = edns.options().as_ref().iter().collect();
    options.sort_by_key(|(code, _)| u16::from(**code));

    let mut rdata = Vec::new();
    for (code, option) in options {
        let single = OPT::new(HashMap::from([(*code, option.clone())]));
        rdata.extend_from_slice(&single.to_bytes()?);
    }

    let mut bare = edns.clone();
    bare.options_mut().as_mut().clear();
    bare.set_rcode_high(message.response_code().high());

    let mut opt_record: Record = Record::from(&bare);
    opt_record.set_data(Some(RData::Unknown {
        code: RecordType::OPT,
        rdata: NULL::with(rdata),
    }));

    // The OPT record goes out as the last additional, ahead of any SIG(0).
    let mut ordered = message.clone();
    *ordered.extensions_mut() = None;
    ordered.add_additional(opt_record);
    ordered.to_vec()
}
