use lorahome_caps::CapabilityError;
use lorahome_frame::FrameError;

/// Errors raised by a device handler, at construction or per message.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The class-specific configuration is missing or inconsistent.
    #[error("invalid device config: {0}")]
    Config(String),

    /// The configuration blob could not be decoded.
    #[error("malformed device config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Sealing or opening a frame failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The decrypted payload did not match the class schema.
    #[error("payload decode failed: {0}")]
    Decode(String),

    /// A collaborator call failed.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// Errors raised while registering or persisting devices.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No factory is registered under the class identifier.
    #[error("unknown device class '{0}'")]
    UnknownClass(String),

    /// The factory rejected the configuration.
    #[error("invalid config for {class} device: {source}")]
    InvalidConfig {
        class: String,
        #[source]
        source: DeviceError,
    },

    /// A device with this identity is already registered.
    #[error("device {0:#x} already registered")]
    DuplicateDevice(u64),

    /// A factory is already registered under this class identifier.
    #[error("device class '{0}' already registered")]
    DuplicateClass(String),

    /// Starting a device's background listener failed.
    #[error("failed to start device {id:#x}: {source}")]
    Start {
        id: u64,
        #[source]
        source: DeviceError,
    },

    /// A device could not describe its persisted configuration.
    #[error("failed to snapshot device {id:#x}: {source}")]
    Snapshot {
        id: u64,
        #[source]
        source: DeviceError,
    },

    /// Reading or writing the device file failed.
    #[error("device file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The device file is not valid YAML of the expected shape.
    #[error("device file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors raised while routing one inbound packet.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The packet cannot hold the 8-byte device identity.
    #[error("packet too short for routing header: {len} bytes")]
    HeaderTooShort { len: usize },

    /// No device is registered under the addressed identity.
    #[error("unknown device {0:#x}")]
    UnknownDevice(u64),

    /// The addressed device failed to process the frame.
    #[error("device {id:#x}: {source}")]
    Device {
        id: u64,
        #[source]
        source: DeviceError,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
