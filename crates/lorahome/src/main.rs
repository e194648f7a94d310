mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "lorahome", version, about = "LoRa telemetry gateway")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        env = "LORAHOME_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr). MQTT and HTTP client crates stay at warn
    /// unless the level is trace.
    #[arg(
        long,
        value_name = "LEVEL",
        env = "LORAHOME_LOG",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "lorahome",
            "send",
            "127.0.0.1:9001",
            "--id",
            "0x1234",
            "--key",
            "000102030405060708090a0b0c0d0e0f",
            "--data",
            "hello",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.id, 0x1234);
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "lorahome",
            "send",
            "127.0.0.1:9001",
            "--id",
            "1",
            "--key",
            "00",
            "--hex",
            "00",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_bad_device_id() {
        let err = Cli::try_parse_from([
            "lorahome", "send", "127.0.0.1:9001", "--id", "kitchen", "--key", "00",
        ])
        .expect_err("bad id should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "lorahome",
            "--log-format",
            "json",
            "serve",
            "--config",
            "/etc/lorahome/config.yaml",
            "--devices",
            "/var/lib/lorahome/devices.yaml",
        ])
        .expect("serve args should parse");
        assert!(matches!(cli.command, Command::Serve(_)));
    }
}
