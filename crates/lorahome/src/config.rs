//! Gateway configuration file.
//!
//! Every section is optional; a missing section disables that
//! collaborator and the gateway falls back to its no-op stand-in.

use std::path::Path;

use lorahome_caps::{InfluxConfig, MqttConfig};
use lorahome_transport::UdpConfig;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<UdpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influxdb: Option<InfluxConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttConfig>,
}

impl GatewayConfig {
    /// Read and parse `path`. An empty file yields the all-disabled config.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| GatewayError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text).map_err(|source| GatewayError::Config {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let parsed: Option<Self> = serde_yaml::from_str(text)?;
        Ok(parsed.unwrap_or_default())
    }
}
