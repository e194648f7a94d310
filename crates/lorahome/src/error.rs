use lorahome_caps::CapabilityError;
use lorahome_registry::RegistryError;
use lorahome_transport::TransportError;

/// Errors that stop the gateway from starting or shutting down cleanly.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The gateway config file could not be read.
    #[error("config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The gateway config file is not valid.
    #[error("config file {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
