pub mod server;
pub mod transport;
pub mod wire_response;

pub use server::ForwardingServer;
pub use transport::{create_resolver, Dialer, DialerOptions, Transport};
