//! Built-in device classes.
//!
//! Each class decodes a protobuf payload from the sealed frame and turns it
//! into time-series points, topic updates and, where the device expects
//! one, a sealed reply. Call [`register_builtin`] once at startup to make
//! them available to a [`DeviceRegistry`].

pub mod common;
pub mod led_strip;
pub mod loveheart;
pub mod multisensor;
pub mod proto;

use lorahome_registry::{DeviceRegistry, RegistryError};

pub use led_strip::{LedStrip, LED_STRIP_CLASS};
pub use loveheart::{animation_allowed, LoveHeart, LOVEHEART_CLASS};
pub use multisensor::{MultiSensor, MULTISENSOR_CLASS};

/// Register every built-in class.
pub fn register_builtin(registry: &DeviceRegistry) -> Result<(), RegistryError> {
    registry.register_class(MULTISENSOR_CLASS, MultiSensor::factory)?;
    registry.register_class(LOVEHEART_CLASS, LoveHeart::factory)?;
    registry.register_class(LED_STRIP_CLASS, LedStrip::factory)?;
    Ok(())
}
