use std::sync::Arc;

use async_trait::async_trait;
use lorahome_caps::Capabilities;
use lorahome_frame::FrameKey;
use lorahome_registry::{BaseConfig, Device, DeviceError, DeviceInfo};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{emission, open_message, resolve_database, snapshot_of, PublishSettings};
use crate::proto::MultiSensorStatus;

pub const MULTISENSOR_CLASS: &str =
    "https://github.com/lorahome/protobufs/blob/master/proto/sensor/multisensor.proto";
pub const MULTISENSOR_NAME: &str = "MultiSensor";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSensorConfig {
    #[serde(flatten)]
    pub base: BaseConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influxdb: Option<InfluxSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InfluxSection {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub measurements: Measurements,
}

/// Measurement names; an empty name switches that reading off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Measurements {
    pub temperature: String,
    pub humidity: String,
    pub ambient_light: String,
    pub battery_voltage: String,
}

impl Default for Measurements {
    fn default() -> Self {
        Self {
            temperature: "temperature".to_string(),
            humidity: "humidity".to_string(),
            ambient_light: "ambient_light".to_string(),
            battery_voltage: "battery_voltage".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MqttSection {
    #[serde(default)]
    pub topics: Topics,
    #[serde(flatten)]
    pub publish: PublishSettings,
    /// Publish temperature in Fahrenheit.
    #[serde(default)]
    pub imperial_units: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    pub temperature: String,
    pub humidity: String,
    pub ambient_light: String,
    pub ambient_light_white: String,
    pub battery_voltage: String,
}

/// Battery-powered environment sensor. Stateless between reports.
pub struct MultiSensor {
    info: DeviceInfo,
    key: FrameKey,
    /// Resolved database; `None` when InfluxDB output is off.
    database: Option<String>,
    config: MultiSensorConfig,
}

impl MultiSensor {
    pub fn new(config: MultiSensorConfig, caps: &Capabilities) -> Result<Self, DeviceError> {
        let key = config.base.frame_key()?;
        let database = config
            .influxdb
            .as_ref()
            .map(|influx| resolve_database(&influx.database, caps))
            .transpose()?;
        Ok(Self {
            info: config.base.info(MULTISENSOR_CLASS, MULTISENSOR_NAME),
            key,
            database,
            config,
        })
    }

    pub fn factory(
        raw: &serde_yaml::Value,
        caps: &Capabilities,
    ) -> Result<Arc<dyn Device>, DeviceError> {
        let config: MultiSensorConfig = serde_yaml::from_value(raw.clone())?;
        Ok(Arc::new(Self::new(config, caps)?))
    }
}

#[async_trait]
impl Device for MultiSensor {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    async fn process_message(&self, caps: &Capabilities, frame: &[u8]) -> Result<(), DeviceError> {
        let status: MultiSensorStatus = open_message(&self.key, frame)?;
        info!(device = %self.info.name, ?status, "multisensor update");

        let influx = self.config.influxdb.as_ref();
        let measurements = influx.map(|i| &i.measurements);
        let measurement = |pick: fn(&Measurements) -> &str| measurements.map(pick).unwrap_or("");
        let mqtt = self.config.mqtt.as_ref();
        let topic = |pick: fn(&Topics) -> &str| mqtt.map(|m| pick(&m.topics)).unwrap_or("");
        let publish = mqtt.map(|m| m.publish).unwrap_or_default();

        let mut out = emission(&self.info, self.database.clone());

        if let Some(t) = &status.temperature {
            out.point(
                measurement(|x| x.temperature.as_str()),
                [("c", t.value_c), ("f", t.value_f)],
            );
            let shown = if mqtt.is_some_and(|m| m.imperial_units) {
                t.value_f
            } else {
                t.value_c
            };
            out.publish_with(
                topic(|x| x.temperature.as_str()),
                format!("{shown:.1}"),
                publish.qos,
                publish.retain,
            );
        }
        if let Some(h) = &status.humidity {
            out.value(measurement(|x| x.humidity.as_str()), h.value);
            out.publish_with(
                topic(|x| x.humidity.as_str()),
                format!("{:.0}", h.value),
                publish.qos,
                publish.retain,
            );
        }
        if let Some(light) = &status.ambient_light {
            out.point(
                measurement(|x| x.ambient_light.as_str()),
                [("als", light.value), ("white", light.white_value)],
            );
            out.publish_with(
                topic(|x| x.ambient_light.as_str()),
                format!("{:.0}", light.value),
                publish.qos,
                publish.retain,
            );
            out.publish_with(
                topic(|x| x.ambient_light_white.as_str()),
                format!("{:.0}", light.white_value),
                publish.qos,
                publish.retain,
            );
        }
        if let Some(battery) = &status.battery {
            let volts = f64::from(battery.voltage_mv) / 1000.0;
            out.point(
                measurement(|x| x.battery_voltage.as_str()),
                [("voltage", volts)],
            );
            out.publish_with(
                topic(|x| x.battery_voltage.as_str()),
                format!("{volts:.2}"),
                publish.qos,
                publish.retain,
            );
        }

        out.flush(caps).await?;
        Ok(())
    }

    fn snapshot(&self) -> Result<serde_yaml::Value, DeviceError> {
        snapshot_of(&self.config)
    }
}
