//! MQTT pub/sub client built on rumqttc.
//!
//! The event loop is driven by [`MqttClient::run`]; inbound publishes are
//! fanned out through a [`TopicRouter`] so any number of local subscribers
//! can share one broker subscription. Filters are re-subscribed, at the
//! QoS their subscribers asked for, on every reconnect.
//!
//! Publishing never waits on the broker: while the connection is down, or
//! when the request queue is full, [`PubSub::publish`] fails immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CapabilityError, Result};
use crate::pubsub::{Message, PubSub, Qos, Subscription, TopicRouter};

const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Broker settings (`mqtt:` section of the gateway config).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttConfig {
    pub broker: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "lorahome".to_string()
}

fn default_clean_session() -> bool {
    true
}

fn default_keep_alive_secs() -> u64 {
    30
}

impl From<Qos> for QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => QoS::AtMostOnce,
            Qos::AtLeastOnce => QoS::AtLeastOnce,
            Qos::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

/// Shared MQTT connection.
pub struct MqttClient {
    client: AsyncClient,
    eventloop: Mutex<Option<EventLoop>>,
    router: TopicRouter,
    broker: String,
    connected: AtomicBool,
}

impl MqttClient {
    /// Create the client. No I/O happens until [`run`](Self::run) is polled.
    pub fn new(config: &MqttConfig) -> Result<Self> {
        if config.broker.trim().is_empty() {
            return Err(CapabilityError::InvalidConfig(
                "mqtt.broker is required".to_string(),
            ));
        }
        if config.client_id.is_empty() || config.client_id.starts_with(' ') {
            return Err(CapabilityError::InvalidConfig(format!(
                "invalid mqtt.client_id {:?}",
                config.client_id
            )));
        }
        let mut options = MqttOptions::new(&config.client_id, &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        options.set_clean_session(config.clean_session);
        if let Some(user) = &config.user {
            options.set_credentials(user, config.password.as_deref().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        Ok(Self {
            client,
            eventloop: Mutex::new(Some(eventloop)),
            router: TopicRouter::new(),
            broker: format!("{}:{}", config.broker, config.port),
            connected: AtomicBool::new(false),
        })
    }

    /// Whether the broker has acknowledged the current connection.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Drive the connection until `shutdown` fires.
    ///
    /// Connection errors are logged and retried. Calling this twice returns
    /// immediately the second time.
    pub async fn run(&self, shutdown: CancellationToken) {
        let eventloop = self
            .eventloop
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        let Some(mut eventloop) = eventloop else {
            warn!("mqtt event loop already running");
            return;
        };

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = Message {
                            topic: publish.topic.clone(),
                            value: String::from_utf8_lossy(&publish.payload).into_owned(),
                        };
                        let delivered = self.router.route(&message);
                        debug!(topic = %message.topic, delivered, "mqtt message routed");
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(broker = %self.broker, "mqtt connected");
                        self.connected.store(true, Ordering::Release);
                        self.resubscribe();
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!(broker = %self.broker, "mqtt disconnected by broker");
                        self.connected.store(false, Ordering::Release);
                    }
                    Ok(_) => {}
                    Err(err) => {
                        self.connected.store(false, Ordering::Release);
                        warn!(broker = %self.broker, error = %err, "mqtt connection error");
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        }
                    }
                },
            }
        }

        self.connected.store(false, Ordering::Release);
        if let Err(err) = self.client.try_disconnect() {
            debug!(error = %err, "mqtt disconnect");
        }
        info!("mqtt client stopped");
    }

    fn resubscribe(&self) {
        for (filter, qos) in self.router.filters_with_qos() {
            if let Err(err) = self.client.try_subscribe(filter.as_str(), qos.into()) {
                warn!(topic = %filter, error = %err, "mqtt resubscribe failed");
            }
        }
    }
}

fn request_error(err: ClientError) -> String {
    match err {
        ClientError::TryRequest(_) => "mqtt request queue is full or closed".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl PubSub for MqttClient {
    async fn publish(&self, topic: &str, value: &str, qos: Qos, retain: bool) -> Result<()> {
        if !self.is_connected() {
            return Err(CapabilityError::Publish {
                topic: topic.to_string(),
                reason: "not connected".to_string(),
            });
        }
        self.client
            .try_publish(topic, qos.into(), retain, value.as_bytes().to_vec())
            .map_err(|err| CapabilityError::Publish {
                topic: topic.to_string(),
                reason: request_error(err),
            })
    }

    /// Subscriptions made before the first connection are sent to the
    /// broker on `ConnAck`.
    fn subscribe(&self, topic: &str, qos: Qos) -> Result<Subscription> {
        let (subscription, changed) = self.router.subscribe(topic, qos);
        if changed && self.is_connected() {
            self.client
                .try_subscribe(topic, qos.into())
                .map_err(|err| CapabilityError::Subscribe {
                    topic: topic.to_string(),
                    reason: request_error(err),
                })?;
        }
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: MqttConfig = serde_yaml::from_str("broker: localhost").unwrap();
        assert_eq!(config.port, 1883);
        assert_eq!(config.client_id, "lorahome");
        assert!(config.clean_session);
        assert!(config.user.is_none());
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        let err = serde_yaml::from_str::<MqttConfig>("broker: localhost\nbrokr: typo").unwrap_err();
        assert!(err.to_string().contains("brokr"));
    }

    #[test]
    fn test_requires_broker() {
        let config: MqttConfig = serde_yaml::from_str("broker: \" \"").unwrap();
        assert!(matches!(
            MqttClient::new(&config),
            Err(CapabilityError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_before_connect_is_queued() {
        let config: MqttConfig = serde_yaml::from_str("broker: 127.0.0.1\nport: 1").unwrap();
        let client = MqttClient::new(&config).unwrap();
        let _sub = client.subscribe("home/+/motion", Qos::AtLeastOnce).unwrap();
        assert!(!client.is_connected());
        assert_eq!(
            client.router.filters_with_qos(),
            vec![("home/+/motion".to_string(), Qos::AtLeastOnce)]
        );
    }

    #[tokio::test]
    async fn test_publish_fails_fast_while_broker_is_down() {
        let config: MqttConfig = serde_yaml::from_str("broker: 127.0.0.1\nport: 1").unwrap();
        let client = std::sync::Arc::new(MqttClient::new(&config).unwrap());
        let shutdown = CancellationToken::new();
        let run = tokio::spawn({
            let client = std::sync::Arc::clone(&client);
            let shutdown = shutdown.clone();
            async move { client.run(shutdown).await }
        });

        for _ in 0..REQUEST_CAPACITY * 2 {
            let result = tokio::time::timeout(
                Duration::from_secs(1),
                client.publish("home/porch/temperature", "19.0", Qos::AtMostOnce, true),
            )
            .await
            .expect("publish must not block");
            assert!(matches!(result, Err(CapabilityError::Publish { .. })));
        }

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let config: MqttConfig = serde_yaml::from_str("broker: 127.0.0.1\nport: 1").unwrap();
        let client = MqttClient::new(&config).unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), client.run(shutdown))
            .await
            .unwrap();
    }
}
