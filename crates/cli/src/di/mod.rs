mod forwarding;

pub use forwarding::ForwardingServices;
