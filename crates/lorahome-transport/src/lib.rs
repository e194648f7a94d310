//! Datagram transport between the gateway and LoRa packet forwarders.
//!
//! The transport is unreliable and unordered; nothing here retries or
//! reorders. Provides:
//! - [`UdpTransport`], bound to a listen address, replying to a fixed gateway
//! - [`BypassTransport`], used when UDP is not configured
//!
//! This is the lowest layer of lorahome. The dispatcher consumes the
//! [`Datagrams`] queue produced here.

pub mod bypass;
pub mod error;
pub mod traits;
pub mod udp;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use bypass::BypassTransport;
pub use error::{Result, TransportError};
pub use traits::{Datagrams, Transport};
pub use udp::{UdpConfig, UdpTransport, DEFAULT_MAX_PACKET_SIZE, DEFAULT_QUEUE_DEPTH};

#[cfg(any(test, feature = "testing"))]
pub use mock::MockTransport;
