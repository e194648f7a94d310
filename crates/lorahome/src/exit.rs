use std::fmt;
use std::io;

use lorahome::GatewayError;
use lorahome_caps::CapabilityError;
use lorahome_frame::FrameError;
use lorahome_registry::RegistryError;
use lorahome_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG: i32 = 78;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => CONFIG,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::InvalidConfig(_) => CliError::new(CONFIG, format!("{context}: {err}")),
        TransportError::Bind { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
            io_error(context, source)
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::PayloadTooLarge { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::InvalidKeyLength(_) | FrameError::InvalidKeyHex(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn registry_error(context: &str, err: RegistryError) -> CliError {
    match err {
        RegistryError::Io { .. } | RegistryError::Start { .. } | RegistryError::Snapshot { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(CONFIG, format!("{context}: {other}")),
    }
}

pub fn gateway_error(context: &str, err: GatewayError) -> CliError {
    match err {
        GatewayError::ConfigIo { source, .. } => io_error(context, source),
        GatewayError::Config { .. } => CliError::new(CONFIG, format!("{context}: {err}")),
        GatewayError::Transport(err) => transport_error(context, err),
        GatewayError::Capability(CapabilityError::InvalidConfig(reason)) => {
            CliError::new(CONFIG, format!("{context}: {reason}"))
        }
        GatewayError::Capability(err) => CliError::new(FAILURE, format!("{context}: {err}")),
        GatewayError::Registry(err) => registry_error(context, err),
    }
}
