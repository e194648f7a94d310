//! Device file: every device's configuration grouped by class identifier.
//!
//! ```yaml
//! urn:lorahome:multisensor:
//!   - id: 0x1234
//!     name: porch
//!     key: 000102030405060708090a0b0c0d0e0f
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use lorahome_caps::Capabilities;
use tracing::{debug, info};

use crate::error::{RegistryError, Result};
use crate::registry::DeviceRegistry;

type DeviceFile = BTreeMap<String, Vec<serde_yaml::Value>>;

/// Replace the registry's devices with those listed in `path`.
///
/// A missing or empty file means no devices. Returns how many were loaded.
pub fn load_devices(path: &Path, registry: &DeviceRegistry, caps: &Capabilities) -> Result<usize> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no device file");
            registry.clear_devices();
            return Ok(0);
        }
        Err(source) => return Err(io_error(path, source)),
    };

    let file: DeviceFile = if content.trim().is_empty() {
        DeviceFile::new()
    } else {
        serde_yaml::from_str::<Option<DeviceFile>>(&content)
            .map_err(|source| RegistryError::Yaml {
                path: path.display().to_string(),
                source,
            })?
            .unwrap_or_default()
    };

    registry.clear_devices();
    let mut loaded = 0usize;
    for (class_id, entries) in &file {
        for raw in entries {
            registry.register_device(class_id, raw, caps)?;
            loaded += 1;
        }
    }
    info!(path = %path.display(), devices = loaded, "device file loaded");
    Ok(loaded)
}

/// Write every registered device back to `path`. Returns how many were saved.
pub fn save_devices(path: &Path, registry: &DeviceRegistry) -> Result<usize> {
    let snapshot = registry.snapshot()?;
    let count = snapshot.values().map(Vec::len).sum();
    let text = serde_yaml::to_string(&snapshot).map_err(|source| RegistryError::Yaml {
        path: path.display().to_string(),
        source,
    })?;

    // Write beside the target and rename so a crash never leaves half a file.
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, text).map_err(|source| io_error(&tmp, source))?;
    std::fs::rename(&tmp, path).map_err(|source| io_error(path, source))?;

    info!(path = %path.display(), devices = count, "device file saved");
    Ok(count)
}

fn io_error(path: &Path, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::probe::{probe_config, register_probe, PROBE_CLASS, PROBE_KEY};

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lorahome-store-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = unique_temp_dir("missing");
        let registry = DeviceRegistry::new();
        register_probe(&registry);

        let loaded =
            load_devices(&dir.join("devices.yaml"), &registry, &Capabilities::disabled()).unwrap();

        assert_eq!(loaded, 0);
        assert!(registry.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_accepts_both_id_forms() {
        let dir = unique_temp_dir("load");
        let path = dir.join("devices.yaml");
        std::fs::write(
            &path,
            format!(
                "{PROBE_CLASS}:\n  - id: 4660\n    name: a\n    key: {PROBE_KEY}\n  - id: \"0x10\"\n    name: b\n    key: {PROBE_KEY}\n"
            ),
        )
        .unwrap();
        let registry = DeviceRegistry::new();
        register_probe(&registry);

        let loaded = load_devices(&path, &registry, &Capabilities::disabled()).unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(registry.lookup(0x1234).unwrap().name(), "a");
        assert_eq!(registry.lookup(0x10).unwrap().name(), "b");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_fails_on_unknown_class() {
        let dir = unique_temp_dir("unknown");
        let path = dir.join("devices.yaml");
        std::fs::write(&path, format!("urn:nope:\n  - id: 1\n    key: {PROBE_KEY}\n")).unwrap();
        let registry = DeviceRegistry::new();
        register_probe(&registry);

        let err = load_devices(&path, &registry, &Capabilities::disabled()).unwrap_err();

        assert!(matches!(err, RegistryError::UnknownClass(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_rejects_malformed_yaml() {
        let dir = unique_temp_dir("malformed");
        let path = dir.join("devices.yaml");
        std::fs::write(&path, "- just\n- a list\n").unwrap();
        let registry = DeviceRegistry::new();

        let err = load_devices(&path, &registry, &Capabilities::disabled()).unwrap_err();

        assert!(matches!(err, RegistryError::Yaml { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_then_load_restores_devices() {
        let dir = unique_temp_dir("save");
        let path = dir.join("devices.yaml");
        let caps = Capabilities::disabled();

        let registry = DeviceRegistry::new();
        register_probe(&registry);
        registry
            .register_device(PROBE_CLASS, &probe_config(0x1234, "porch"), &caps)
            .unwrap();
        registry
            .register_device(PROBE_CLASS, &probe_config(2, "attic"), &caps)
            .unwrap();
        assert_eq!(save_devices(&path, &registry).unwrap(), 2);
        assert!(!path.with_extension("yaml.tmp").exists());

        let restored = DeviceRegistry::new();
        register_probe(&restored);
        assert_eq!(load_devices(&path, &restored, &caps).unwrap(), 2);
        assert_eq!(restored.lookup(0x1234).unwrap().name(), "porch");
        assert_eq!(restored.lookup(2).unwrap().name(), "attic");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
