use std::sync::Arc;

use async_trait::async_trait;
use lorahome_caps::Capabilities;
use lorahome_frame::FrameKey;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::DeviceError;

/// Identity accessors shared by every device handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: u64,
    pub name: String,
    /// Registry key and persisted kind tag.
    pub class_id: String,
    /// Short human-readable class name.
    pub class_name: String,
}

/// A registered device.
///
/// `process_message` receives the sealed frame with the routing header
/// already stripped; opening it with the device key is the handler's job.
#[async_trait]
pub trait Device: Send + Sync {
    fn info(&self) -> &DeviceInfo;

    fn id(&self) -> u64 {
        self.info().id
    }

    fn name(&self) -> &str {
        &self.info().name
    }

    fn class_id(&self) -> &str {
        &self.info().class_id
    }

    fn class_name(&self) -> &str {
        &self.info().class_name
    }

    async fn process_message(&self, caps: &Capabilities, frame: &[u8]) -> Result<(), DeviceError>;

    /// Spawn background listeners. The returned task must exit once
    /// `shutdown` is cancelled.
    fn start(
        self: Arc<Self>,
        _caps: &Capabilities,
        _shutdown: CancellationToken,
    ) -> Result<Option<JoinHandle<()>>, DeviceError> {
        Ok(None)
    }

    /// Configuration to write back to the device file, including any
    /// state that must survive a restart.
    fn snapshot(&self) -> Result<serde_yaml::Value, DeviceError>;
}

/// Fields every device configuration carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseConfig {
    /// Decimal integer or `0x`-prefixed hex string.
    #[serde(with = "device_id")]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Hex-encoded AES key.
    pub key: String,
}

impl BaseConfig {
    /// Decode and validate the key.
    pub fn frame_key(&self) -> Result<FrameKey, DeviceError> {
        Ok(FrameKey::from_hex(&self.key)?)
    }

    pub fn info(&self, class_id: &str, class_name: &str) -> DeviceInfo {
        DeviceInfo {
            id: self.id,
            name: self.name.clone(),
            class_id: class_id.to_string(),
            class_name: class_name.to_string(),
        }
    }
}

/// Parse a device identity from config text.
pub fn parse_device_id(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    parsed.map_err(|err| format!("invalid device id '{text}': {err}"))
}

/// Serde adapter: accepts integers or hex strings, writes `0x` hex.
pub mod device_id {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{id:#x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        deserializer.deserialize_any(IdVisitor)
    }

    struct IdVisitor;

    impl Visitor<'_> for IdVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an unsigned integer or a 0x-prefixed hex string")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u64, E> {
            u64::try_from(value).map_err(|_| E::custom(format!("negative device id {value}")))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u64, E> {
            super::parse_device_id(value).map_err(E::custom)
        }
    }
}
