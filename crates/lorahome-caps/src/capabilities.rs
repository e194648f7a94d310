use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::pubsub::{NoopPubSub, PubSub};
use crate::sender::PacketSender;
use crate::timeseries::{NoopWriter, TimeSeriesWriter};

/// The collaborators every device handler is given.
///
/// Built once at startup and shared by every handler. Cloning is cheap and
/// shares the same underlying clients.
#[derive(Clone)]
pub struct Capabilities {
    pub sender: Arc<dyn PacketSender>,
    pub writer: Arc<dyn TimeSeriesWriter>,
    pub pubsub: Arc<dyn PubSub>,
}

impl Capabilities {
    pub fn new(
        sender: Arc<dyn PacketSender>,
        writer: Arc<dyn TimeSeriesWriter>,
        pubsub: Arc<dyn PubSub>,
    ) -> Self {
        Self {
            sender,
            writer,
            pubsub,
        }
    }

    /// Every collaborator is a no-op.
    pub fn disabled() -> Self {
        Self::new(Arc::new(DropSender), Arc::new(NoopWriter), Arc::new(NoopPubSub))
    }

    pub fn with_sender(mut self, sender: Arc<dyn PacketSender>) -> Self {
        self.sender = sender;
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn TimeSeriesWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_pubsub(mut self, pubsub: Arc<dyn PubSub>) -> Self {
        self.pubsub = pubsub;
        self
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

/// Sender that discards every packet.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropSender;

#[async_trait]
impl PacketSender for DropSender {
    async fn send(&self, _packet: &[u8]) -> Result<()> {
        Ok(())
    }
}
