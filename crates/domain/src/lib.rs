//! ecs-forwarder domain layer
pub mod config;
pub mod ecs_subnet;
pub mod errors;
pub mod upstream_protocol;

pub use config::{CliOverrides, Config, ConfigError};
pub use ecs_subnet::EcsSubnet;
pub use errors::DomainError;
pub use upstream_protocol::{split_host_port, UpstreamProtocol};
