/// Errors raised by capability collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Sending a packet on the transport failed.
    #[error("send failed: {0}")]
    Send(#[from] lorahome_transport::TransportError),

    /// Writing a time-series batch failed.
    #[error("time-series write failed: {0}")]
    Write(String),

    /// Publishing to a topic failed.
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// Subscribing to a topic failed.
    #[error("subscribe to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// The collaborator could not be constructed from its config.
    #[error("invalid collaborator config: {0}")]
    InvalidConfig(String),

    /// Several independent emissions failed.
    #[error("{} emission(s) failed: {}", .0.len(), join_errors(.0))]
    Partial(Vec<CapabilityError>),
}

impl CapabilityError {
    /// Collapse a list of failures: none is `Ok`, one is itself, more is `Partial`.
    pub fn collect(mut errors: Vec<CapabilityError>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(CapabilityError::Partial(errors)),
        }
    }
}

fn join_errors(errors: &[CapabilityError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, CapabilityError>;
