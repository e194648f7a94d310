use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Timelike;
use lorahome_caps::{CapabilityError, Capabilities, Qos, Subscription};
use lorahome_frame::FrameKey;
use lorahome_registry::{BaseConfig, Device, DeviceError, DeviceInfo};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::common::{
    emission, open_message, parse_level, resolve_database, send_message, snapshot_of,
    PublishSettings,
};
use crate::proto::{LoveHeartStatus, LoveHeartStatusResponse};

pub const LOVEHEART_CLASS: &str =
    "https://github.com/lorahome/protobufs/blob/master/proto/loveheart/loveheart.proto";
pub const LOVEHEART_NAME: &str = "LoveHeart";

/// Recognised by the device firmware as a valid response.
pub const RESPONSE_MAGIC: u32 = 0xddeeff;

/// Animation plays only this long after the last motion event.
pub const MOTION_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Local hours `[start, end)` during which animation may play.
pub const ANIMATION_HOURS: (u32, u32) = (10, 20);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoveHeartConfig {
    #[serde(flatten)]
    pub base: BaseConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influxdb: Option<InfluxSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttSection>,
    /// Last sequence number sent to the device.
    #[serde(default)]
    pub sequence_send: u32,
    #[serde(default)]
    pub sequence_recv: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InfluxSection {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub measurements: Measurements,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Measurements {
    pub temperature: String,
    pub humidity: String,
    pub light_als: String,
    pub light_white: String,
    pub battery_voltage: String,
    pub battery_percent: String,
    pub charging: String,
    pub animation: String,
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
    pub temperature: String,
    pub humidity: String,
    pub battery_voltage: String,
    pub battery_percent: String,
    pub light_als: String,
    pub light_white: String,
    /// Control: non-zero enables animation globally.
    pub animation: String,
    /// Control: a positive value records motion.
    pub motion: String,
}

#[derive(Debug, Default)]
struct State {
    sequence_send: u32,
    sequence_recv: u32,
    last_motion: Option<Instant>,
    animation_enabled: bool,
}

/// Decorative heart with a light show; answers every status report.
pub struct LoveHeart {
    info: DeviceInfo,
    key: FrameKey,
    /// Resolved database; `None` when InfluxDB output is off.
    database: Option<String>,
    config: LoveHeartConfig,
    state: Mutex<State>,
}

impl LoveHeart {
    pub fn new(config: LoveHeartConfig, caps: &Capabilities) -> Result<Self, DeviceError> {
        let key = config.base.frame_key()?;
        let database = config
            .influxdb
            .as_ref()
            .map(|influx| resolve_database(&influx.database, caps))
            .transpose()?;
        let state = State {
            sequence_send: config.sequence_send,
            sequence_recv: config.sequence_recv,
            ..State::default()
        };
        Ok(Self {
            info: config.base.info(LOVEHEART_CLASS, LOVEHEART_NAME),
            key,
            database,
            config,
            state: Mutex::new(state),
        })
    }

    pub fn factory(
        raw: &serde_yaml::Value,
        caps: &Capabilities,
    ) -> Result<Arc<dyn Device>, DeviceError> {
        let config: LoveHeartConfig = serde_yaml::from_value(raw.clone())?;
        Ok(Arc::new(Self::new(config, caps)?))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build the next response, bumping the send sequence.
    fn next_response(&self, hour: u32) -> LoveHeartStatusResponse {
        let mut state = self.state();
        let since_motion = state.last_motion.map(|at| at.elapsed());
        let enable_animation = animation_allowed(hour, since_motion, state.animation_enabled);
        state.sequence_send = state.sequence_send.wrapping_add(1);
        LoveHeartStatusResponse {
            enable_animation,
            sequence: state.sequence_send,
            magic: RESPONSE_MAGIC,
        }
    }

    fn on_motion(&self, value: &str) {
        if parse_level(value) > 0 {
            self.state().last_motion = Some(Instant::now());
            debug!(device = %self.info.name, "motion detected");
        }
    }

    fn on_animation(&self, value: &str) {
        let enabled = parse_level(value) != 0;
        self.state().animation_enabled = enabled;
        info!(device = %self.info.name, enabled, "global animation state changed");
    }

    async fn listen(
        self: Arc<Self>,
        mut motion: Subscription,
        mut animation: Subscription,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(msg) = motion.recv() => self.on_motion(&msg.value),
                Some(msg) = animation.recv() => self.on_animation(&msg.value),
            }
        }
        debug!(device = %self.info.name, "listener stopped");
    }
}

/// Whether the heart may animate at local `hour`, given the time since
/// the last motion event and the global switch.
pub fn animation_allowed(hour: u32, since_motion: Option<Duration>, enabled: bool) -> bool {
    let (start, end) = ANIMATION_HOURS;
    enabled
        && (start..end).contains(&hour)
        && since_motion.is_some_and(|elapsed| elapsed < MOTION_WINDOW)
}

#[async_trait]
impl Device for LoveHeart {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    async fn process_message(&self, caps: &Capabilities, frame: &[u8]) -> Result<(), DeviceError> {
        let status: LoveHeartStatus = open_message(&self.key, frame)?;
        info!(device = %self.info.name, ?status, "loveheart status");

        let mut errors = Vec::new();

        // Reply first: the device only listens briefly after transmitting.
        let response = self.next_response(chrono::Local::now().hour());
        info!(
            device = %self.info.name,
            animation = response.enable_animation,
            sequence = response.sequence,
            "sending loveheart response"
        );
        match send_message(caps, &self.info, &self.key, &response).await {
            Ok(()) => {}
            Err(DeviceError::Capability(err)) => {
                warn!(device = %self.info.name, error = %err, "response send failed");
                errors.push(err);
            }
            Err(err) => return Err(err),
        }

        let influx = self.config.influxdb.as_ref();
        let m = influx.map(|i| i.measurements.clone()).unwrap_or_default();
        let mqtt = self.config.mqtt.as_ref();
        let t = mqtt.map(|m| m.topics.clone()).unwrap_or_default();
        let publish = mqtt.map(|m| m.publish).unwrap_or_default();
        let topic_update = |out: &mut lorahome_caps::Emission, topic: &str, value: String| {
            out.publish_with(topic, value, publish.qos, publish.retain);
        };

        let temperature = status.temperature as f32 / 100.0;
        let volts = f64::from(status.voltage_mv) / 1000.0;

        let mut out = emission(&self.info, self.database.clone());
        if influx.is_some() {
            out.point(&m.temperature, [("c", temperature)])
                .value(&m.humidity, status.humidity as f32)
                .point(&m.battery_voltage, [("voltage", volts)])
                .point(&m.battery_percent, [("percent", status.battery_percents)])
                .point(&m.light_als, [("als", status.light_als)])
                .point(&m.light_white, [("white", status.light_white)])
                .value(&m.charging, status.charging)
                .value(&m.animation, status.animation);
        }
        topic_update(&mut out, &t.temperature, format!("{temperature:.1}"));
        topic_update(&mut out, &t.humidity, status.humidity.to_string());
        topic_update(&mut out, &t.battery_voltage, format!("{volts:.2}"));
        topic_update(&mut out, &t.battery_percent, status.battery_percents.to_string());
        topic_update(&mut out, &t.light_als, status.light_als.to_string());
        topic_update(&mut out, &t.light_white, status.light_white.to_string());

        if let Err(err) = out.flush(caps).await {
            errors.push(err);
        }
        CapabilityError::collect(errors)?;
        Ok(())
    }

    fn start(
        self: Arc<Self>,
        caps: &Capabilities,
        shutdown: CancellationToken,
    ) -> Result<Option<JoinHandle<()>>, DeviceError> {
        let Some(mqtt) = self.config.mqtt.as_ref() else {
            return Ok(None);
        };
        let subscribe = |topic: &str| -> Result<Subscription, DeviceError> {
            if topic.is_empty() {
                Ok(Subscription::pending())
            } else {
                Ok(caps.pubsub.subscribe(topic, Qos::AtMostOnce)?)
            }
        };
        let motion = subscribe(&mqtt.topics.motion)?;
        let animation = subscribe(&mqtt.topics.animation)?;
        Ok(Some(tokio::spawn(self.listen(motion, animation, shutdown))))
    }

    fn snapshot(&self) -> Result<serde_yaml::Value, DeviceError> {
        let mut config = self.config.clone();
        {
            let state = self.state();
            config.sequence_send = state.sequence_send;
            config.sequence_recv = state.sequence_recv;
        }
        snapshot_of(&config)
    }
}
