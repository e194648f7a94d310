use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

/// Delivery guarantee requested from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl TryFrom<u8> for Qos {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(format!("invalid qos {other} (expected 0, 1 or 2)")),
        }
    }
}

impl From<Qos> for u8 {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => 1,
            Qos::ExactlyOnce => 2,
        }
    }
}

/// An inbound message on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub value: String,
}

/// Unbounded stream of messages for one subscription.
///
/// Each call to [`PubSub::subscribe`] yields a fresh, independent stream.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Message>,
    _keepalive: Option<mpsc::UnboundedSender<Message>>,
}

impl Subscription {
    fn new(rx: mpsc::UnboundedReceiver<Message>) -> Self {
        Self {
            rx,
            _keepalive: None,
        }
    }

    /// A subscription that never yields.
    pub fn pending() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            _keepalive: Some(tx),
        }
    }

    /// Next message; `None` once the publisher side is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Publish/subscribe client shared by all devices.
#[async_trait]
pub trait PubSub: Send + Sync {
    async fn publish(&self, topic: &str, value: &str, qos: Qos, retain: bool) -> Result<()>;

    /// Register interest in `topic` (MQTT filter syntax allowed).
    fn subscribe(&self, topic: &str, qos: Qos) -> Result<Subscription>;
}

/// Client used when pub/sub is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPubSub;

#[async_trait]
impl PubSub for NoopPubSub {
    async fn publish(&self, _topic: &str, _value: &str, _qos: Qos, _retain: bool) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self, _topic: &str, _qos: Qos) -> Result<Subscription> {
        Ok(Subscription::pending())
    }
}

#[derive(Debug, Default)]
struct Route {
    /// Highest QoS any subscriber asked for.
    qos: Qos,
    senders: Vec<mpsc::UnboundedSender<Message>>,
}

impl Route {
    fn is_live(&self) -> bool {
        self.senders.iter().any(|tx| !tx.is_closed())
    }
}

/// Fans inbound messages out to every subscription whose filter matches.
#[derive(Debug, Default)]
pub struct TopicRouter {
    routes: Mutex<HashMap<String, Route>>,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber for `filter`. Returns `true` when the filter is new
    /// or its QoS was raised, i.e. the broker must be told.
    pub fn subscribe(&self, filter: &str, qos: Qos) -> (Subscription, bool) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut routes = self.lock();
        let route = routes.entry(filter.to_string()).or_default();
        let changed = route.senders.is_empty() || qos > route.qos;
        route.qos = route.qos.max(qos);
        route.senders.push(tx);
        (Subscription::new(rx), changed)
    }

    /// Deliver `message` to matching subscribers and return how many got it.
    ///
    /// Subscribers whose stream was dropped are pruned.
    pub fn route(&self, message: &Message) -> usize {
        let mut routes = self.lock();
        let mut delivered = 0;
        for (filter, route) in routes.iter_mut() {
            if !topic_matches(filter, &message.topic) {
                continue;
            }
            route.senders.retain(|tx| {
                let ok = tx.send(message.clone()).is_ok();
                delivered += usize::from(ok);
                ok
            });
        }
        routes.retain(|_, route| !route.senders.is_empty());
        delivered
    }

    /// Filters with at least one live subscriber.
    pub fn filters(&self) -> Vec<String> {
        self.filters_with_qos()
            .into_iter()
            .map(|(filter, _)| filter)
            .collect()
    }

    /// Live filters with the QoS to subscribe them at, sorted by filter.
    pub fn filters_with_qos(&self) -> Vec<(String, Qos)> {
        let mut routes = self.lock();
        routes.retain(|_, route| route.is_live());
        let mut filters: Vec<(String, Qos)> = routes
            .iter()
            .map(|(filter, route)| (filter.clone(), route.qos))
            .collect();
        filters.sort_unstable();
        filters
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Route>> {
        self.routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// MQTT topic filter matching: `+` matches one level, trailing `#` the rest.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
