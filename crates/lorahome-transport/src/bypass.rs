use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Datagrams, Transport};

/// Transport used when UDP is not configured.
///
/// Never yields a datagram and silently drops outbound packets.
pub struct BypassTransport {
    // Held so the queue stays open and `recv` pends instead of closing.
    _tx: mpsc::Sender<Bytes>,
    rx: Mutex<Option<Datagrams>>,
}

impl BypassTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            _tx: tx,
            rx: Mutex::new(Some(rx)),
        }
    }
}

impl Default for BypassTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for BypassTransport {
    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!("udp is not enabled");
        shutdown.cancelled().await;
        Ok(())
    }

    fn receive(&self) -> Result<Datagrams> {
        let mut slot = self
            .rx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.take().ok_or(TransportError::ReceiverTaken)
    }

    async fn send(&self, packet: &[u8]) -> Result<()> {
        debug!(len = packet.len(), "udp disabled, dropping packet");
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "bypass"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_run_returns_on_shutdown() {
        let transport = BypassTransport::new();
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        transport.run(shutdown).await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_pends_and_send_drops() {
        let transport = BypassTransport::new();
        let mut datagrams = transport.receive().unwrap();
        transport.send(b"dropped").await.unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(20), datagrams.recv()).await;
        assert!(pending.is_err(), "bypass queue must never yield");
    }
}
