use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use lorahome_registry::DeviceInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct DeviceOutput<'a> {
    id: String,
    name: &'a str,
    class_name: &'a str,
    class_id: &'a str,
}

impl<'a> From<&'a DeviceInfo> for DeviceOutput<'a> {
    fn from(info: &'a DeviceInfo) -> Self {
        Self {
            id: format!("{:#x}", info.id),
            name: &info.name,
            class_name: &info.class_name,
            class_id: &info.class_id,
        }
    }
}

pub fn print_devices(devices: &[DeviceInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<DeviceOutput<'_>> = devices.iter().map(DeviceOutput::from).collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "NAME", "CLASS", "CLASS ID"]);
            for device in devices {
                let row = DeviceOutput::from(device);
                table.add_row(vec![
                    row.id,
                    row.name.to_string(),
                    row.class_name.to_string(),
                    row.class_id.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for device in devices {
                println!(
                    "{:#x} name={} class={}",
                    device.id, device.name, device.class_name
                );
            }
        }
        OutputFormat::Raw => {
            for device in devices {
                println!("{:#x}", device.id);
            }
        }
    }
}

#[derive(Serialize)]
struct SentOutput<'a> {
    device_id: String,
    addr: &'a str,
    payload_size: usize,
    packet_size: usize,
}

pub fn print_sent(
    device_id: u64,
    addr: &str,
    payload_size: usize,
    packet: &[u8],
    format: OutputFormat,
) {
    let out = SentOutput {
        device_id: format!("{device_id:#x}"),
        addr,
        payload_size,
        packet_size: packet.len(),
    };
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "ADDR", "PAYLOAD", "PACKET"])
                .add_row(vec![
                    out.device_id,
                    addr.to_string(),
                    payload_size.to_string(),
                    packet.len().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "device={} addr={} payload={} packet={}",
                out.device_id,
                addr,
                payload_size,
                packet.len()
            );
        }
        OutputFormat::Raw => {
            let mut stdout = std::io::stdout();
            let _ = writeln!(stdout, "{}", hex::encode(packet));
            let _ = stdout.flush();
        }
    }
}
