//! Minimal device used by the registry's own tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lorahome_caps::Capabilities;
use serde::{Deserialize, Serialize};

use crate::device::{BaseConfig, Device, DeviceInfo};
use crate::error::DeviceError;
use crate::registry::DeviceRegistry;

pub const PROBE_CLASS: &str = "urn:lorahome:test:probe";

pub const PROBE_KEY: &str = "000102030405060708090a0b0c0d0e0f";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProbeConfig {
    #[serde(flatten)]
    base: BaseConfig,
    #[serde(default)]
    fail: bool,
}

/// Frames handed to probe devices, tagged with the receiving identity.
pub type FrameLog = Arc<Mutex<Vec<(u64, Vec<u8>)>>>;

/// Records every frame it is handed; optionally fails.
pub struct ProbeDevice {
    info: DeviceInfo,
    config: ProbeConfig,
    log: FrameLog,
}

impl ProbeDevice {
    fn build(raw: &serde_yaml::Value, log: FrameLog) -> Result<Arc<dyn Device>, DeviceError> {
        let config: ProbeConfig = serde_yaml::from_value(raw.clone())?;
        config.base.frame_key()?;
        Ok(Arc::new(Self {
            info: config.base.info(PROBE_CLASS, "Probe"),
            config,
            log,
        }))
    }
}

#[async_trait]
impl Device for ProbeDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    async fn process_message(&self, _caps: &Capabilities, frame: &[u8]) -> Result<(), DeviceError> {
        self.log.lock().unwrap().push((self.info.id, frame.to_vec()));
        if self.config.fail {
            return Err(DeviceError::Decode("probe set to fail".into()));
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<serde_yaml::Value, DeviceError> {
        Ok(serde_yaml::to_value(&self.config)?)
    }
}

/// Register the probe class and return the log its devices write to.
pub fn register_probe(registry: &DeviceRegistry) -> FrameLog {
    let log = FrameLog::default();
    let shared = Arc::clone(&log);
    registry
        .register_class(PROBE_CLASS, move |raw, _caps| {
            ProbeDevice::build(raw, Arc::clone(&shared))
        })
        .unwrap();
    log
}

pub fn probe_config(id: u64, name: &str) -> serde_yaml::Value {
    serde_yaml::from_str(&format!("id: {id}\nname: {name}\nkey: {PROBE_KEY}")).unwrap()
}
