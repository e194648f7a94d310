use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("lorahome {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: lorahome");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("LORAHOME_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("device_classes: {}", builtin_class_names().join(", "));

    Ok(SUCCESS)
}

fn builtin_class_names() -> Vec<&'static str> {
    vec![
        lorahome_devices::multisensor::MULTISENSOR_NAME,
        lorahome_devices::loveheart::LOVEHEART_NAME,
        lorahome_devices::led_strip::LED_STRIP_NAME,
    ]
}
