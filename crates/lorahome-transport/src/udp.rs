use std::net::SocketAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{Datagrams, Transport};

/// Default receive buffer size; longer datagrams are truncated.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1024;

/// Default inbound queue depth.
pub const DEFAULT_QUEUE_DEPTH: usize = 1;

/// UDP transport settings (`udp:` section of the gateway config).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UdpConfig {
    /// Address to listen on, e.g. `0.0.0.0:9000`.
    pub listen: String,
    /// Packet forwarder that receives outbound datagrams.
    #[serde(default)]
    pub gateway: Option<String>,
    /// Receive buffer size in bytes.
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// Number of datagrams buffered between the socket and the dispatch loop.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_max_packet_size() -> usize {
    DEFAULT_MAX_PACKET_SIZE
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

impl UdpConfig {
    /// Config listening on `listen` with defaults for everything else.
    pub fn new(listen: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            gateway: None,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    /// Set the gateway address.
    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.listen.trim().is_empty() {
            return Err(TransportError::InvalidConfig(
                "udp.listen is required".to_string(),
            ));
        }
        if self.max_packet_size == 0 {
            return Err(TransportError::InvalidConfig(
                "udp.max_packet_size must be greater than zero".to_string(),
            ));
        }
        if self.queue_depth == 0 {
            return Err(TransportError::InvalidConfig(
                "udp.queue_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// UDP transport.
///
/// Receives datagrams from any peer on the listen socket and sends replies
/// to the configured gateway. Without a gateway, outbound packets are dropped.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    gateway: Option<SocketAddr>,
    max_packet_size: usize,
    tx: mpsc::Sender<Bytes>,
    rx: Mutex<Option<Datagrams>>,
}

impl UdpTransport {
    /// Bind the listen socket and resolve the gateway address.
    pub async fn bind(config: &UdpConfig) -> Result<Self> {
        config.validate()?;

        let socket = UdpSocket::bind(&config.listen)
            .await
            .map_err(|source| TransportError::Bind {
                addr: config.listen.clone(),
                source,
            })?;
        let local_addr = socket.local_addr()?;

        let gateway = match &config.gateway {
            Some(addr) => Some(resolve(addr).await?),
            None => None,
        };

        let (tx, rx) = mpsc::channel(config.queue_depth);
        info!(addr = %local_addr, gateway = ?gateway, "listening on udp");

        Ok(Self {
            socket,
            local_addr,
            gateway,
            max_packet_size: config.max_packet_size,
            tx,
            rx: Mutex::new(Some(rx)),
        })
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The resolved gateway address, if any.
    pub fn gateway(&self) -> Option<SocketAddr> {
        self.gateway
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let mut buf = vec![0u8; self.max_packet_size];

        loop {
            let (len, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(err) => {
                        warn!(%err, "udp receive failed");
                        continue;
                    }
                },
            };
            debug!(%peer, len, "datagram received");

            let packet = Bytes::copy_from_slice(&buf[..len]);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                queued = self.tx.send(packet) => {
                    if queued.is_err() {
                        debug!("datagram queue closed");
                        break;
                    }
                }
            }
        }

        info!(addr = %self.local_addr, "udp transport stopped");
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
        let Some(gateway) = self.gateway else {
            debug!(len = packet.len(), "no gateway configured, dropping packet");
            return Ok(());
        };
        self.socket.send_to(packet, gateway).await?;
        debug!(%gateway, len = packet.len(), "datagram sent");
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "udp"
    }
}

async fn resolve(addr: &str) -> Result<SocketAddr> {
    let mut addrs = tokio::net::lookup_host(addr)
        .await
        .map_err(|err| TransportError::Resolve {
            addr: addr.to_string(),
            reason: err.to_string(),
        })?;
    addrs.next().ok_or_else(|| TransportError::Resolve {
        addr: addr.to_string(),
        reason: "no addresses found".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: UdpConfig = serde_yaml::from_str("listen: \"0.0.0.0:9000\"").unwrap();
        assert_eq!(config, UdpConfig::new("0.0.0.0:9000"));
        assert_eq!(config.max_packet_size, 1024);
        assert_eq!(config.queue_depth, 1);
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        let result: std::result::Result<UdpConfig, _> =
            serde_yaml::from_str("listen: \"0.0.0.0:9000\"\nport: 5");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_bind_requires_listen() {
        let err = UdpTransport::bind(&UdpConfig::new(" ")).await.err().unwrap();
        assert!(matches!(err, TransportError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let err = UdpTransport::bind(&UdpConfig::new("not-an-address"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_receive_and_send() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();

        let config = UdpConfig::new("127.0.0.1:0").with_gateway(peer_addr.to_string());
        let transport = std::sync::Arc::new(UdpTransport::bind(&config).await.unwrap());
        assert_eq!(transport.gateway(), Some(peer_addr));

        let mut datagrams = transport.receive().unwrap();
        assert!(matches!(
            transport.receive(),
            Err(TransportError::ReceiverTaken)
        ));

        let shutdown = CancellationToken::new();
        let runner = {
            let transport = std::sync::Arc::clone(&transport);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { transport.run(shutdown).await })
        };

        peer.send_to(b"uplink", transport.local_addr()).await.unwrap();
        let packet = tokio::time::timeout(Duration::from_secs(2), datagrams.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(packet.as_ref(), b"uplink");

        transport.send(b"downlink").await.unwrap();
        let mut buf = [0u8; 32];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"downlink");

        shutdown.cancel();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_send_without_gateway_is_noop() {
        let transport = UdpTransport::bind(&UdpConfig::new("127.0.0.1:0")).await.unwrap();
        transport.send(b"nowhere").await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_truncates_to_max_packet_size() {
        let mut config = UdpConfig::new("127.0.0.1:0");
        config.max_packet_size = 4;
        let transport = std::sync::Arc::new(UdpTransport::bind(&config).await.unwrap());
        let mut datagrams = transport.receive().unwrap();

        let shutdown = CancellationToken::new();
        let runner = {
            let transport = std::sync::Arc::clone(&transport);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { transport.run(shutdown).await })
        };

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        peer.send_to(b"0123456789", transport.local_addr()).await.unwrap();
        let packet = tokio::time::timeout(Duration::from_secs(2), datagrams.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(packet.as_ref(), b"0123");

        shutdown.cancel();
        runner.await.unwrap().unwrap();
    }
}
