use lorahome_frame::{seal_envelope, FrameKey};
use lorahome_transport::{Transport, UdpConfig, UdpTransport};

use crate::cmd::{runtime, SendArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let key = FrameKey::from_hex(&args.key).map_err(|err| frame_error("invalid --key", err))?;
    let payload = resolve_payload(&args)?;
    let packet =
        seal_envelope(args.id, &key, &payload).map_err(|err| frame_error("seal failed", err))?;

    let config = UdpConfig::new(args.bind.clone()).with_gateway(args.addr.clone());
    runtime()?.block_on(async {
        let transport = UdpTransport::bind(&config)
            .await
            .map_err(|err| transport_error("bind failed", err))?;
        transport
            .send(&packet)
            .await
            .map_err(|err| transport_error("send failed", err))
    })?;

    print_sent(args.id, &args.addr, payload.len(), &packet, format);
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(text) = &args.hex {
        return hex::decode(text.trim())
            .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")));
    }
    Ok(Vec::new())
}
