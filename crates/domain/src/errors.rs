use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Dial error: {0}")]
    DialError(String),

    #[error("Handshake error: {0}")]
    HandshakeError(String),

    #[error("Failed to encode DNS message: {0}")]
    EncodeError(String),

    #[error("Failed to decode DNS message: {0}")]
    DecodeError(String),

    #[error("Upstream {server} returned HTTP {status}")]
    UpstreamStatusError { server: String, status: u16 },

    #[error("Response ID mismatch from {server}: expected {expected}, received {received}")]
    IdMismatchError {
        server: String,
        expected: u16,
        received: u16,
    },

    #[error("Transport timeout talking to {server}")]
    TransportTimeout { server: String },

    #[error("Transport I/O error: {0}")]
    TransportIo(String),
}

impl DomainError {
    /// Errors scoped to a single exchange with the upstream.
    pub fn is_transport_error(&self) -> bool {
        !matches!(self, Self::ConfigError(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "config",
            Self::DialError(_) => "dial",
            Self::HandshakeError(_) => "handshake",
            Self::EncodeError(_) => "encode",
            Self::DecodeError(_) => "decode",
            Self::UpstreamStatusError { .. } => "upstream_status",
            Self::IdMismatchError { .. } => "id_mismatch",
            Self::TransportTimeout { .. } => "timeout",
            Self::TransportIo(_) => "io",
        }
    }
}
