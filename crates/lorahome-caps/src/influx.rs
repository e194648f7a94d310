//! InfluxDB 1.x writer speaking line protocol over HTTP.

use std::fmt::Write as _;
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CapabilityError, Result};
use crate::timeseries::{Batch, FieldValue, Point, TimeSeriesWriter};

/// InfluxDB settings (`influxdb:` section of the gateway config).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://localhost:8086`.
    pub url: String,
    /// Database for devices that do not name one.
    #[serde(default)]
    pub default_database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// HTTP request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Time-series writer backed by an InfluxDB server.
pub struct InfluxWriter {
    client: reqwest::Client,
    base_url: String,
    default_database: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxWriter {
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(CapabilityError::InvalidConfig(
                "influxdb.url is required".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| CapabilityError::InvalidConfig(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            default_database: config.default_database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Probe `/ping` and log the server version.
    pub async fn ping(&self) -> Result<()> {
        let resp = self
            .client
            .get(format!("{}/ping", self.base_url))
            .send()
            .await
            .map_err(|err| CapabilityError::Write(err.to_string()))?;
        let version = resp
            .headers()
            .get("X-Influxdb-Version")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        resp.error_for_status()
            .map_err(|err| CapabilityError::Write(err.to_string()))?;
        info!(url = %self.base_url, %version, "influxdb reachable");
        Ok(())
    }
}

#[async_trait]
impl TimeSeriesWriter for InfluxWriter {
    async fn write(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let database = batch
            .database
            .as_deref()
            .or(self.default_database.as_deref())
            .ok_or_else(|| CapabilityError::Write("no database configured".to_string()))?;

        let body = encode_lines(&batch.points);
        if body.is_empty() {
            warn!(database, "batch has no writable fields");
            return Ok(());
        }

        let mut request = self
            .client
            .post(format!("{}/write", self.base_url))
            .query(&[("db", database), ("precision", "s")])
            .body(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| CapabilityError::Write(err.to_string()))?;
        debug!(database, points = batch.points.len(), "influxdb batch written");
        Ok(())
    }

    fn default_database(&self) -> Option<&str> {
        self.default_database.as_deref()
    }
}

/// Render points as line protocol, one point per line, second precision.
///
/// Non-finite floats are skipped; points left without fields are skipped.
pub fn encode_lines(points: &[Point]) -> String {
    let mut out = String::new();
    for point in points {
        let fields: Vec<String> = point
            .fields
            .iter()
            .filter(|(_, value)| match value {
                FieldValue::Float(v) => v.is_finite(),
                FieldValue::Integer(_) => true,
            })
            .map(|(key, value)| format!("{}={}", escape_key(key), value))
            .collect();
        if fields.is_empty() {
            continue;
        }

        out.push_str(&escape_measurement(&point.measurement));
        for (key, value) in &point.tags {
            if value.is_empty() {
                continue;
            }
            let _ = write!(out, ",{}={}", escape_key(key), escape_key(value));
        }
        out.push(' ');
        out.push_str(&fields.join(","));

        let secs = point
            .timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let _ = writeln!(out, " {secs}");
    }
    out
}

fn escape_measurement(input: &str) -> String {
    escape(input, &[',', ' '])
}

fn escape_key(input: &str) -> String {
    escape(input, &[',', '=', ' '])
}

fn escape(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
