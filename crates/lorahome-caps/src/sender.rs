use std::sync::Arc;

use async_trait::async_trait;
use lorahome_transport::Transport;

use crate::error::Result;

/// Queues outbound packets on the shared transport.
#[async_trait]
pub trait PacketSender: Send + Sync {
    async fn send(&self, packet: &[u8]) -> Result<()>;
}

/// [`PacketSender`] backed by a [`Transport`].
#[derive(Clone)]
pub struct TransportSender {
    transport: Arc<dyn Transport>,
}

impl TransportSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl PacketSender for TransportSender {
    async fn send(&self, packet: &[u8]) -> Result<()> {
        self.transport.send(packet).await?;
        Ok(())
    }
}
