use std::sync::Arc;

use lorahome_caps::Capabilities;
use lorahome_frame::parse_envelope;

use crate::error::DispatchError;
use crate::registry::DeviceRegistry;

/// Routes inbound envelopes to the addressed device.
///
/// Never decrypts and never mutates the registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
    caps: Capabilities,
}

impl Dispatcher {
    pub fn new(registry: Arc<DeviceRegistry>, caps: Capabilities) -> Self {
        Self { registry, caps }
    }

    /// Strip the routing header and hand the frame to its device.
    ///
    /// Returns the identity of the device that handled the packet.
    pub async fn dispatch(&self, packet: &[u8]) -> Result<u64, DispatchError> {
        let envelope =
            parse_envelope(packet).map_err(|_| DispatchError::HeaderTooShort { len: packet.len() })?;
        let id = envelope.device_id;
        let device = self
            .registry
            .lookup(id)
            .ok_or(DispatchError::UnknownDevice(id))?;

        device
            .process_message(&self.caps, envelope.frame)
            .await
            .map_err(|source| DispatchError::Device { id, source })?;
        Ok(id)
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }
}
