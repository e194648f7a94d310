/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the listen address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to resolve the gateway address.
    #[error("failed to resolve {addr}: {reason}")]
    Resolve { addr: String, reason: String },

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The inbound queue has already been handed out.
    #[error("datagram receiver already taken")]
    ReceiverTaken,

    /// The configuration is unusable.
    #[error("invalid transport config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
