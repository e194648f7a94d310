use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Queue of inbound datagrams, in receipt order.
pub type Datagrams = mpsc::Receiver<Bytes>;

/// A datagram transport shared by the dispatch loop and every device.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Pump inbound datagrams until `shutdown` is cancelled or a fatal error occurs.
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;

    /// Take the inbound queue. Succeeds once; later calls fail with
    /// [`TransportError::ReceiverTaken`](crate::TransportError::ReceiverTaken).
    fn receive(&self) -> Result<Datagrams>;

    /// Send one datagram toward the devices.
    async fn send(&self, packet: &[u8]) -> Result<()>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}
