use lorahome::{shutdown_signal, Gateway, GatewayConfig};
use tracing::info;

use crate::cmd::{runtime, ServeArgs};
use crate::exit::{gateway_error, CliError, CliResult, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = match &args.config {
        Some(path) => {
            GatewayConfig::load(path).map_err(|err| gateway_error("invalid config", err))?
        }
        None => {
            info!("no config file given, running with every collaborator disabled");
            GatewayConfig::default()
        }
    };

    runtime()?.block_on(async {
        let gateway = Gateway::start(&config, &args.devices)
            .await
            .map_err(|err| gateway_error("startup failed", err))?;
        gateway
            .run(shutdown_signal())
            .await
            .map_err(|err| gateway_error("shutdown failed", err))?;
        Ok::<_, CliError>(SUCCESS)
    })
}
