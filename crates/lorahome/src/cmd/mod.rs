use std::path::PathBuf;

use clap::{Args, Subcommand};
use lorahome_registry::parse_device_id;

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod devices;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway until interrupted.
    Serve(ServeArgs),
    /// Load the device file and list its devices.
    Devices(DevicesArgs),
    /// Seal and send one frame to a device or packet forwarder.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Devices(args) => devices::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Gateway config file. Without one every collaborator is disabled.
    #[arg(long, short = 'c', env = "LORAHOME_CONFIG")]
    pub config: Option<PathBuf>,
    /// Device file, loaded at startup and rewritten at shutdown.
    #[arg(long, short = 'd', env = "LORAHOME_DEVICES", default_value = "devices.yaml")]
    pub devices: PathBuf,
}

#[derive(Args, Debug)]
pub struct DevicesArgs {
    /// Device file to load.
    #[arg(long, short = 'd', env = "LORAHOME_DEVICES", default_value = "devices.yaml")]
    pub devices: PathBuf,
    /// List the known device classes instead.
    #[arg(long)]
    pub classes: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination address, e.g. 10.0.0.5:9001.
    pub addr: String,
    /// Device identity for the routing header (decimal or 0x hex).
    #[arg(long, value_parser = parse_device_id)]
    pub id: u64,
    /// Device key, hex encoded.
    #[arg(long)]
    pub key: String,
    /// Raw string payload.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
    /// Local address to send from.
    #[arg(long, default_value = "0.0.0.0:0")]
    pub bind: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
