use std::sync::Arc;

use async_trait::async_trait;
use lorahome_caps::{Capabilities, Qos, Subscription};
use lorahome_frame::FrameKey;
use lorahome_registry::{BaseConfig, Device, DeviceError, DeviceInfo};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::common::{emission, open_message, send_message, snapshot_of, PublishSettings};
use crate::proto::LedStripStatus;

pub const LED_STRIP_CLASS: &str =
    "https://github.com/lorahome/devices/blob/master/proto/light/led_strip.proto";
pub const LED_STRIP_NAME: &str = "LedStrip";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedStripConfig {
    #[serde(flatten)]
    pub base: BaseConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MqttSection {
    #[serde(default)]
    pub topics: Topics,
    #[serde(flatten)]
    pub publish: PublishSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    /// Reported channel levels, comma separated.
    pub status: String,
    /// Integer level to command.
    pub control: String,
}

/// Dimmable LED strip driven over the control topic.
pub struct LedStrip {
    info: DeviceInfo,
    key: FrameKey,
    config: LedStripConfig,
}

impl LedStrip {
    pub fn new(config: LedStripConfig) -> Result<Self, DeviceError> {
        let key = config.base.frame_key()?;
        Ok(Self {
            info: config.base.info(LED_STRIP_CLASS, LED_STRIP_NAME),
            key,
            config,
        })
    }

    pub fn factory(
        raw: &serde_yaml::Value,
        _caps: &Capabilities,
    ) -> Result<Arc<dyn Device>, DeviceError> {
        let config: LedStripConfig = serde_yaml::from_value(raw.clone())?;
        Ok(Arc::new(Self::new(config)?))
    }

    /// Command every channel to `level`.
    pub async fn set_level(&self, caps: &Capabilities, level: u32) -> Result<(), DeviceError> {
        let command = LedStripStatus {
            channels: vec![level],
        };
        send_message(caps, &self.info, &self.key, &command).await
    }

    async fn listen(
        self: Arc<Self>,
        caps: Capabilities,
        mut control: Subscription,
        shutdown: CancellationToken,
    ) {
        loop {
            let msg = tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = control.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            let level = match msg.value.trim().parse::<u32>() {
                Ok(level) => level,
                Err(err) => {
                    warn!(topic = %msg.topic, value = %msg.value, error = %err, "invalid light level");
                    continue;
                }
            };
            info!(device = %self.info.name, level, "set light level");
            if let Err(err) = self.set_level(&caps, level).await {
                warn!(device = %self.info.name, error = %err, "unable to send light level");
            }
        }
        debug!(device = %self.info.name, "listener stopped");
    }
}

#[async_trait]
impl Device for LedStrip {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    async fn process_message(&self, caps: &Capabilities, frame: &[u8]) -> Result<(), DeviceError> {
        let status: LedStripStatus = open_message(&self.key, frame)?;
        info!(device = %self.info.name, channels = ?status.channels, "led strip status");

        if let Some(mqtt) = &self.config.mqtt {
            let levels = status
                .channels
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let mut out = emission(&self.info, None);
            out.publish_with(&mqtt.topics.status, levels, mqtt.publish.qos, mqtt.publish.retain);
            out.flush(caps).await?;
        }
        Ok(())
    }

    fn start(
        self: Arc<Self>,
        caps: &Capabilities,
        shutdown: CancellationToken,
    ) -> Result<Option<JoinHandle<()>>, DeviceError> {
        let topic = match &self.config.mqtt {
            Some(mqtt) if !mqtt.topics.control.is_empty() => mqtt.topics.control.clone(),
            _ => return Ok(None),
        };
        let control = caps.pubsub.subscribe(&topic, Qos::AtMostOnce)?;
        Ok(Some(tokio::spawn(self.listen(caps.clone(), control, shutdown))))
    }

    fn snapshot(&self) -> Result<serde_yaml::Value, DeviceError> {
        snapshot_of(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lorahome_caps::testing::Recorder;
    use lorahome_frame::{open, parse_envelope, seal};
    use prost::Message;

    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f";

    fn raw() -> serde_yaml::Value {
        serde_yaml::from_str(&format!(
            "id: 0x3000\nname: shelf\nkey: {KEY}\nmqtt:\n  topics:\n    status: shelf/status\n    control: shelf/set\n"
        ))
        .unwrap()
    }

    fn decode_sent(packet: &[u8]) -> (u64, LedStripStatus) {
        let envelope = parse_envelope(packet).unwrap();
        let plaintext = open(&FrameKey::from_hex(KEY).unwrap(), envelope.frame).unwrap();
        (
            envelope.device_id,
            LedStripStatus::decode(plaintext.as_slice()).unwrap(),
        )
    }

    #[tokio::test]
    async fn status_is_published() {
        let rec = Recorder::new();
        let device = LedStrip::factory(&raw(), &rec.caps).unwrap();
        let key = FrameKey::from_hex(KEY).unwrap();
        let status = LedStripStatus {
            channels: vec![10, 200],
        };
        let frame = seal(&key, &status.encode_to_vec()).unwrap();

        device.process_message(&rec.caps, &frame).await.unwrap();

        assert_eq!(rec.pubsub.last_value("shelf/status").as_deref(), Some("10,200"));
        assert!(rec.writer.batches().is_empty());
    }

    #[tokio::test]
    async fn control_topic_sends_sealed_level() {
        let rec = Recorder::new();
        let device = LedStrip::factory(&raw(), &rec.caps).unwrap();
        let shutdown = CancellationToken::new();
        let handle = device.start(&rec.caps, shutdown.clone()).unwrap().unwrap();

        rec.pubsub.push("shelf/set", "oops");
        rec.pubsub.push("shelf/set", "128");
        for _ in 0..50 {
            if !rec.transport.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let sent = rec.transport.sent();
        assert_eq!(sent.len(), 1);
        let (id, command) = decode_sent(&sent[0]);
        assert_eq!(id, 0x3000);
        assert_eq!(command.channels, vec![128]);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn without_control_topic_no_listener() {
        let rec = Recorder::new();
        let raw: serde_yaml::Value =
            serde_yaml::from_str(&format!("id: 1\nkey: {KEY}")).unwrap();
        let device = LedStrip::factory(&raw, &rec.caps).unwrap();
        assert!(device
            .start(&rec.caps, CancellationToken::new())
            .unwrap()
            .is_none());
        assert!(rec.pubsub.subscriptions().is_empty());
    }
}
