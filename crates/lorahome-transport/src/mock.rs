use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TransportError};
use crate::traits::{Datagrams, Transport};

/// In-memory transport for tests: inject inbound datagrams, inspect sent ones.
pub struct MockTransport {
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    rx: Mutex<Option<Datagrams>>,
    sent: Mutex<Vec<Bytes>>,
    fail_sends: Mutex<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            sent: Mutex::new(Vec::new()),
            fail_sends: Mutex::new(false),
        }
    }

    /// Queue an inbound datagram.
    pub fn inject(&self, packet: impl Into<Bytes>) {
        let tx = self.tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            tx.try_send(packet.into()).expect("mock inbound queue full");
        }
    }

    /// Close the inbound queue; the dispatch loop sees end of stream.
    pub fn close(&self) {
        self.tx.lock().unwrap().take();
    }

    /// Every packet passed to `send`, in order.
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    /// Make subsequent sends fail.
    pub fn fail_sends(&self, fail: bool) {
        *self.fail_sends.lock().unwrap() = fail;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        shutdown.cancelled().await;
        Ok(())
    }

    fn receive(&self) -> Result<Datagrams> {
        self.rx
            .lock()
            .unwrap()
            .take()
            .ok_or(TransportError::ReceiverTaken)
    }

    async fn send(&self, packet: &[u8]) -> Result<()> {
        if *self.fail_sends.lock().unwrap() {
            return Err(TransportError::Io(std::io::Error::other("mock send failure")));
        }
        self.sent
            .lock()
            .unwrap()
            .push(Bytes::copy_from_slice(packet));
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}
