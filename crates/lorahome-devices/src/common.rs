//! Pieces shared by the built-in device classes.

use lorahome_caps::{Capabilities, Emission, Qos};
use lorahome_frame::{open, seal_envelope, FrameKey};
use lorahome_registry::{DeviceError, DeviceInfo};
use serde::{Deserialize, Serialize};

/// Delivery settings applied to every topic a device publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublishSettings {
    #[serde(default)]
    pub retain: bool,
    #[serde(default)]
    pub qos: Qos,
}

/// Open `frame` with `key` and decode the plaintext as `M`.
pub fn open_message<M>(key: &FrameKey, frame: &[u8]) -> Result<M, DeviceError>
where
    M: prost::Message + Default,
{
    let plaintext = open(key, frame)?;
    M::decode(plaintext.as_slice()).map_err(|err| DeviceError::Decode(err.to_string()))
}

/// Encode `message`, seal it and send it addressed to `info.id`.
pub async fn send_message<M>(
    caps: &Capabilities,
    info: &DeviceInfo,
    key: &FrameKey,
    message: &M,
) -> Result<(), DeviceError>
where
    M: prost::Message,
{
    let packet = seal_envelope(info.id, key, &message.encode_to_vec())?;
    caps.sender.send(&packet).await?;
    Ok(())
}

/// Emission tagged with the device identity.
pub fn emission(info: &DeviceInfo, database: Option<String>) -> Emission {
    Emission::new(database)
        .tag("device_id", info.id.to_string())
        .tag("class_name", info.class_name.clone())
        .tag("name", info.name.clone())
}

/// Database to write to: the configured name, else the writer's default.
///
/// The config keeps what the user wrote, so a device relying on the
/// default follows it across restarts.
pub fn resolve_database(configured: &str, caps: &Capabilities) -> Result<String, DeviceError> {
    if !configured.is_empty() {
        return Ok(configured.to_string());
    }
    caps.writer
        .default_database()
        .map(str::to_string)
        .ok_or_else(|| DeviceError::Config("influxdb database name is required".to_string()))
}

/// Parse an integer control value; garbage reads as zero.
pub fn parse_level(value: &str) -> i64 {
    value.trim().parse().unwrap_or(0)
}

pub fn snapshot_of<T: Serialize>(config: &T) -> Result<serde_yaml::Value, DeviceError> {
    Ok(serde_yaml::to_value(config)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use lorahome_caps::{Batch, TimeSeriesWriter};

    use super::*;

    struct DefaultDb;

    #[async_trait]
    impl TimeSeriesWriter for DefaultDb {
        async fn write(&self, _batch: Batch) -> lorahome_caps::Result<()> {
            Ok(())
        }

        fn default_database(&self) -> Option<&str> {
            Some("home")
        }
    }

    #[test]
    fn test_resolve_database() {
        let mut named = "garden".to_string();
        resolve_database(&mut named, &Capabilities::disabled()).unwrap();
        assert_eq!(named, "garden");

        let mut empty = String::new();
        let err = resolve_database(&mut empty, &Capabilities::disabled()).unwrap_err();
        assert!(matches!(err, DeviceError::Config(_)));

        let caps = Capabilities::disabled().with_writer(Arc::new(DefaultDb));
        resolve_database(&mut empty, &caps).unwrap();
        assert_eq!(empty, "home");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("1"), 1);
        assert_eq!(parse_level(" 42\n"), 42);
        assert_eq!(parse_level("on"), 0);
    }
}
