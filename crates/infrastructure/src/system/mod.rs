pub mod interfaces;

pub use interfaces::{list_local_interfaces, list_local_ipv4_addresses, LocalInterface};
