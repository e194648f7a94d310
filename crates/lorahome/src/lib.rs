//! LoRa telemetry gateway.
//!
//! lorahome receives sealed frames from LoRa packet forwarders over UDP,
//! routes each one to the device it addresses and lets that device's
//! handler decrypt, decode and emit its readings to InfluxDB and MQTT.
//!
//! # Crate Structure
//!
//! - [`frame`]: AES-CBC framing codec and routing envelope
//! - [`transport`]: UDP datagram transport
//! - [`caps`]: collaborator contracts shared with every device
//! - [`registry`]: device registry, dispatcher and device file
//! - [`devices`]: built-in device classes
//! - [`config`] and [`gateway`]: process configuration and lifecycle

pub mod config;
pub mod error;
pub mod gateway;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use gateway::{run_dispatch_loop, shutdown_signal, DispatchStats, Gateway};

/// Re-export frame types.
pub mod frame {
    pub use lorahome_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use lorahome_transport::*;
}

/// Re-export capability types.
pub mod caps {
    pub use lorahome_caps::*;
}

/// Re-export registry types.
pub mod registry {
    pub use lorahome_registry::*;
}

/// Re-export the built-in device classes.
pub mod devices {
    pub use lorahome_devices::*;
}
