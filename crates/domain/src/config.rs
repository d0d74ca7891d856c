mod ecs;
mod errors;
mod logging;
mod root;
mod server;
mod upstream;

pub use ecs::{EcsConfig, DEFAULT_PUBLIC_IP_SERVICE};
pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use root::{CliOverrides, Config};
pub use server::ServerConfig;
pub use upstream::{UpstreamConfig, DEFAULT_DOH_URL};
