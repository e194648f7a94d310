use lorahome_caps::Capabilities;
use lorahome_devices::register_builtin;
use lorahome_registry::{load_devices, DeviceInfo, DeviceRegistry};

use crate::cmd::DevicesArgs;
use crate::exit::{registry_error, CliResult, SUCCESS};
use crate::output::{print_devices, OutputFormat};

pub fn run(args: DevicesArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = DeviceRegistry::new();
    register_builtin(&registry).map_err(|err| registry_error("registration failed", err))?;

    if args.classes {
        for class in registry.classes() {
            println!("{class}");
        }
        return Ok(SUCCESS);
    }

    // Listing only needs the configs; collaborators stay disconnected.
    load_devices(&args.devices, &registry, &Capabilities::disabled())
        .map_err(|err| registry_error("invalid device file", err))?;

    let devices: Vec<DeviceInfo> = registry
        .devices()
        .iter()
        .map(|device| device.info().clone())
        .collect();
    print_devices(&devices, format);
    Ok(SUCCESS)
}
