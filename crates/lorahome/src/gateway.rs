//! Gateway lifecycle.
//!
//! [`Gateway::start`] builds the collaborators from the config file and
//! loads the device file. [`Gateway::run`] spawns the transport, MQTT and
//! device listener tasks, dispatches datagrams until the shutdown signal
//! fires, waits for every task to stop and then writes the device file
//! back so persisted counters survive a restart.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lorahome_caps::{
    Capabilities, InfluxWriter, MqttClient, NoopPubSub, NoopWriter, PubSub, TimeSeriesWriter,
    TransportSender,
};
use lorahome_devices::register_builtin;
use lorahome_registry::{load_devices, save_devices, DeviceRegistry, Dispatcher};
use lorahome_transport::{BypassTransport, Datagrams, Transport, UdpTransport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::error::Result;

/// Packet counters from one run of the dispatch loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub handled: u64,
    pub failed: u64,
}

pub struct Gateway {
    transport: Arc<dyn Transport>,
    mqtt: Option<Arc<MqttClient>>,
    caps: Capabilities,
    registry: Arc<DeviceRegistry>,
    devices_path: PathBuf,
}

impl Gateway {
    /// Bind the transport, connect the collaborators and load the device file.
    ///
    /// Bind failures, bad collaborator settings and any device that fails to
    /// register are fatal. An unreachable InfluxDB is only logged.
    pub async fn start(config: &GatewayConfig, devices_path: impl Into<PathBuf>) -> Result<Self> {
        let transport: Arc<dyn Transport> = match &config.udp {
            Some(udp) => Arc::new(UdpTransport::bind(udp).await?),
            None => Arc::new(BypassTransport::new()),
        };

        let writer: Arc<dyn TimeSeriesWriter> = match &config.influxdb {
            Some(influx) => {
                let writer = InfluxWriter::new(influx)?;
                if let Err(err) = writer.ping().await {
                    warn!(url = %influx.url, error = %err, "influxdb is not reachable");
                }
                Arc::new(writer)
            }
            None => {
                info!("influxdb is not enabled");
                Arc::new(NoopWriter)
            }
        };

        let mqtt = match &config.mqtt {
            Some(mqtt) => Some(Arc::new(MqttClient::new(mqtt)?)),
            None => {
                info!("mqtt is not enabled");
                None
            }
        };
        let pubsub: Arc<dyn PubSub> = match &mqtt {
            Some(client) => client.clone(),
            None => Arc::new(NoopPubSub),
        };

        let caps = Capabilities::new(
            Arc::new(TransportSender::new(Arc::clone(&transport))),
            writer,
            pubsub,
        );
        let mut gateway = Self::with_capabilities(transport, caps, devices_path)?;
        gateway.mqtt = mqtt;
        Ok(gateway)
    }

    /// Assemble a gateway around already-built collaborators.
    ///
    /// `caps.sender` is expected to write to `transport`.
    pub fn with_capabilities(
        transport: Arc<dyn Transport>,
        caps: Capabilities,
        devices_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let devices_path = devices_path.into();
        let registry = Arc::new(DeviceRegistry::new());
        register_builtin(&registry)?;

        load_devices(&devices_path, &registry, &caps)?;

        Ok(Self {
            transport,
            mqtt: None,
            caps,
            registry,
            devices_path,
        })
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn devices_path(&self) -> &Path {
        &self.devices_path
    }

    /// Run until `signal` resolves, then stop every task and save the devices.
    pub async fn run<F>(self, signal: F) -> Result<DispatchStats>
    where
        F: Future<Output = ()>,
    {
        let shutdown = CancellationToken::new();
        let datagrams = self.transport.receive()?;

        let mut tasks = Vec::new();
        let transport = Arc::clone(&self.transport);
        let token = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(err) = transport.run(token).await {
                error!(transport = transport.transport_name(), error = %err, "transport stopped");
            }
        }));
        if let Some(mqtt) = &self.mqtt {
            let mqtt = Arc::clone(mqtt);
            let token = shutdown.clone();
            tasks.push(tokio::spawn(async move { mqtt.run(token).await }));
        }

        match self.registry.start_all(&self.caps, &shutdown) {
            Ok(listeners) => tasks.extend(listeners),
            Err(err) => {
                shutdown.cancel();
                join_all(tasks).await;
                return Err(err.into());
            }
        }
        info!(
            devices = self.registry.len(),
            transport = self.transport.transport_name(),
            "gateway running"
        );

        let dispatcher = Dispatcher::new(Arc::clone(&self.registry), self.caps.clone());
        let stats = run_dispatch_loop(&dispatcher, datagrams, signal).await;

        shutdown.cancel();
        join_all(tasks).await;

        let saved = save_devices(&self.devices_path, &self.registry)?;
        info!(
            saved,
            handled = stats.handled,
            failed = stats.failed,
            path = %self.devices_path.display(),
            "gateway stopped"
        );
        Ok(stats)
    }
}

/// Dispatch datagrams until `signal` resolves or the queue closes.
///
/// A packet that cannot be routed or processed is logged and dropped; it
/// never ends the loop. The signal wins when both are ready.
pub async fn run_dispatch_loop<F>(
    dispatcher: &Dispatcher,
    mut datagrams: Datagrams,
    signal: F,
) -> DispatchStats
where
    F: Future<Output = ()>,
{
    tokio::pin!(signal);
    let mut stats = DispatchStats::default();

    loop {
        tokio::select! {
            biased;
            _ = &mut signal => {
                info!("shutdown requested");
                break;
            }
            packet = datagrams.recv() => {
                let Some(packet) = packet else {
                    warn!("datagram queue closed");
                    break;
                };
                match dispatcher.dispatch(&packet).await {
                    Ok(device_id) => {
                        stats.handled += 1;
                        debug!(device_id, len = packet.len(), "packet handled");
                    }
                    Err(err) => {
                        stats.failed += 1;
                        warn!(len = packet.len(), error = %err, "packet dropped");
                    }
                }
            }
        }
    }

    stats
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl+c"),
        _ = terminate => info!("received SIGTERM"),
    }
}

async fn join_all(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(err) = task.await {
            warn!(error = %err, "background task failed");
        }
    }
}
