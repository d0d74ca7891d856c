mod config;
mod logging;

pub use config::{load_config, print_local_addresses};
pub use logging::init_logging;
