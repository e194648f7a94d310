//! Device registry and packet dispatch.
//!
//! Device classes attach a factory under a class identifier; devices are
//! built from their raw configuration and stored under their identity.
//! The [`Dispatcher`] strips the routing header from each inbound packet
//! and hands the sealed frame to the addressed device.
//!
//! The registry is an explicit object shared by reference. Both maps are
//! locked, so registration and lookup are safe from any thread.

pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod store;

#[cfg(test)]
mod probe;

pub use config::RegistryPolicy;
pub use device::{parse_device_id, BaseConfig, Device, DeviceInfo};
pub use dispatch::Dispatcher;
pub use error::{DeviceError, DispatchError, RegistryError, Result};
pub use registry::{DeviceFactory, DeviceRegistry};
pub use store::{load_devices, save_devices};
