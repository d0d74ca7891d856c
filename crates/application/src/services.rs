pub mod ecs_injector;
pub mod wire_format;

pub use ecs_injector::{EcsInjector, FORWARD_EDNS_PAYLOAD};
pub use wire_format::encode_message;
