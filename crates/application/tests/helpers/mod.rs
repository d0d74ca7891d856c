#![allow(dead_code)]

mod mock_upstream;

pub use messages::{answer_address, build_query, subnet_option};
pub use mock_upstream::{MockPublicIpDiscovery, MockUpstreamResolver};
