//! Collaborators handed to every device handler.
//!
//! A [`Capabilities`] bundle carries three shared clients:
//! - a [`PacketSender`] queueing replies on the transport
//! - a [`TimeSeriesWriter`] for tagged numeric points
//! - a [`PubSub`] client for topic updates and control subscriptions
//!
//! Handlers only invoke these; they never replace them. [`Emission`] collects
//! the outputs of one decoded message and flushes them independently.

pub mod capabilities;
pub mod emission;
pub mod error;
pub mod influx;
pub mod mqtt;
pub mod pubsub;
pub mod sender;
pub mod timeseries;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use capabilities::{Capabilities, DropSender};
pub use emission::Emission;
pub use error::{CapabilityError, Result};
pub use influx::{encode_lines, InfluxConfig, InfluxWriter};
pub use mqtt::{MqttClient, MqttConfig};
pub use pubsub::{topic_matches, Message, NoopPubSub, PubSub, Qos, Subscription, TopicRouter};
pub use sender::{PacketSender, TransportSender};
pub use timeseries::{Batch, FieldValue, NoopWriter, Point, TimeSeriesWriter};
