//! Forwarding use cases and the ports the infrastructure layer implements.
pub mod ports;
pub mod services;
pub mod use_cases;
