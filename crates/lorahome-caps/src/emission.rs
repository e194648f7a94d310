use std::collections::BTreeMap;
use std::time::SystemTime;

use tracing::warn;

use crate::capabilities::Capabilities;
use crate::error::{CapabilityError, Result};
use crate::pubsub::Qos;
use crate::timeseries::{Batch, FieldValue, Point};

#[derive(Debug, Clone, PartialEq)]
struct Publish {
    topic: String,
    value: String,
    qos: Qos,
    retain: bool,
}

/// Measurements and topic updates produced by one decoded message.
///
/// Entries with an empty measurement name or topic are dropped so that
/// unset config entries simply switch the output off. [`flush`](Self::flush)
/// attempts every output even when an earlier one fails.
#[derive(Debug, Clone)]
pub struct Emission {
    database: Option<String>,
    tags: BTreeMap<String, String>,
    timestamp: SystemTime,
    points: Vec<Point>,
    publishes: Vec<Publish>,
}

impl Emission {
    pub fn new(database: Option<String>) -> Self {
        Self {
            database,
            tags: BTreeMap::new(),
            timestamp: SystemTime::now(),
            points: Vec::new(),
            publishes: Vec::new(),
        }
    }

    /// Tag applied to every point.
    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }

    /// Add a point with the given fields.
    pub fn point<I, K, V>(&mut self, measurement: &str, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        if measurement.is_empty() {
            return self;
        }
        let fields: BTreeMap<String, FieldValue> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if fields.is_empty() {
            return self;
        }
        self.points.push(Point {
            measurement: measurement.to_string(),
            tags: self.tags.clone(),
            fields,
            timestamp: self.timestamp,
        });
        self
    }

    /// Add a single-field point keyed `value`.
    pub fn value(&mut self, measurement: &str, value: impl Into<FieldValue>) -> &mut Self {
        self.point(measurement, [("value", value.into())])
    }

    /// Queue a topic update.
    pub fn publish_with(
        &mut self,
        topic: &str,
        value: impl Into<String>,
        qos: Qos,
        retain: bool,
    ) -> &mut Self {
        if topic.is_empty() {
            return self;
        }
        self.publishes.push(Publish {
            topic: topic.to_string(),
            value: value.into(),
            qos,
            retain,
        });
        self
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn publish_count(&self) -> usize {
        self.publishes.len()
    }

    /// Write the points as one batch, then publish every topic.
    ///
    /// Each failure is logged; all of them are returned together.
    pub async fn flush(self, caps: &Capabilities) -> Result<()> {
        let mut errors = Vec::new();

        if !self.points.is_empty() {
            let mut batch = Batch::new(self.database);
            batch.points = self.points;
            if let Err(err) = caps.writer.write(batch).await {
                warn!(error = %err, "time-series write failed");
                errors.push(err);
            }
        }

        for publish in self.publishes {
            if let Err(err) = caps
                .pubsub
                .publish(&publish.topic, &publish.value, publish.qos, publish.retain)
                .await
            {
                warn!(topic = %publish.topic, error = %err, "publish failed");
                errors.push(err);
            }
        }

        CapabilityError::collect(errors)
    }
}
