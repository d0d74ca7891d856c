//! ecs-forwarder infrastructure: upstream transports, the forwarding
//! listener and the host-facing helpers the binary needs at startup.
pub mod dns;
pub mod public_ip;
pub mod system;
