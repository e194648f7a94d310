//! Recording collaborators for tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lorahome_transport::MockTransport;

use crate::capabilities::Capabilities;
use crate::error::{CapabilityError, Result};
use crate::pubsub::{Message, PubSub, Qos, Subscription, TopicRouter};
use crate::sender::TransportSender;
use crate::timeseries::{Batch, TimeSeriesWriter};

/// Writer that keeps every batch it is given.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    batches: Mutex<Vec<Batch>>,
    fail: Mutex<bool>,
    default_database: Option<String>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer that reports `database` as its default.
    pub fn with_default_database(database: &str) -> Self {
        Self {
            default_database: Some(database.to_string()),
            ..Self::default()
        }
    }

    /// Batches received so far, including ones that were failed.
    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }

    /// Total points across all batches.
    pub fn point_count(&self) -> usize {
        self.batches.lock().unwrap().iter().map(|b| b.points.len()).sum()
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl TimeSeriesWriter for RecordingWriter {
    async fn write(&self, batch: Batch) -> Result<()> {
        self.batches.lock().unwrap().push(batch);
        if *self.fail.lock().unwrap() {
            return Err(CapabilityError::Write("recording writer set to fail".into()));
        }
        Ok(())
    }

    fn default_database(&self) -> Option<&str> {
        self.default_database.as_deref()
    }
}

/// One recorded publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub value: String,
    pub qos: Qos,
    pub retain: bool,
}

/// Pub/sub client that records publishes and lets tests push messages.
#[derive(Debug, Default)]
pub struct RecordingPubSub {
    published: Mutex<Vec<Published>>,
    failing: Mutex<HashSet<String>>,
    router: TopicRouter,
}

impl RecordingPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful publishes, in order.
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    /// Last value successfully published on `topic`.
    pub fn last_value(&self, topic: &str) -> Option<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|p| p.topic == topic)
            .map(|p| p.value.clone())
    }

    /// Make publishes to `topic` fail.
    pub fn fail_topic(&self, topic: &str) {
        self.failing.lock().unwrap().insert(topic.to_string());
    }

    /// Deliver an inbound message to matching subscriptions.
    pub fn push(&self, topic: &str, value: &str) -> usize {
        self.router.route(&Message {
            topic: topic.to_string(),
            value: value.to_string(),
        })
    }

    /// Filters currently subscribed.
    pub fn subscriptions(&self) -> Vec<String> {
        self.router.filters()
    }
}

#[async_trait]
impl PubSub for RecordingPubSub {
    async fn publish(&self, topic: &str, value: &str, qos: Qos, retain: bool) -> Result<()> {
        if self.failing.lock().unwrap().contains(topic) {
            return Err(CapabilityError::Publish {
                topic: topic.to_string(),
                reason: "recording pubsub set to fail".into(),
            });
        }
        self.published.lock().unwrap().push(Published {
            topic: topic.to_string(),
            value: value.to_string(),
            qos,
            retain,
        });
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: Qos) -> Result<Subscription> {
        let (subscription, _) = self.router.subscribe(topic, qos);
        Ok(subscription)
    }
}

/// Capabilities wired to recording doubles, with handles to inspect them.
pub struct Recorder {
    pub transport: Arc<MockTransport>,
    pub writer: Arc<RecordingWriter>,
    pub pubsub: Arc<RecordingPubSub>,
    pub caps: Capabilities,
}

impl Recorder {
    pub fn new() -> Self {
        Self::with_writer(RecordingWriter::new())
    }

    pub fn with_writer(writer: RecordingWriter) -> Self {
        let transport = Arc::new(MockTransport::new());
        let writer = Arc::new(writer);
        let pubsub = Arc::new(RecordingPubSub::new());
        let caps = Capabilities::new(
            Arc::new(TransportSender::new(transport.clone())),
            writer.clone(),
            pubsub.clone(),
        );
        Self {
            transport,
            writer,
            pubsub,
            caps,
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}
