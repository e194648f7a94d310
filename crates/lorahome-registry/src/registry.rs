use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lorahome_caps::Capabilities;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RegistryPolicy;
use crate::device::Device;
use crate::error::{DeviceError, RegistryError, Result};

/// Builds a device handler from its raw configuration.
pub type DeviceFactory =
    Arc<dyn Fn(&serde_yaml::Value, &Capabilities) -> std::result::Result<Arc<dyn Device>, DeviceError> + Send + Sync>;

/// Class-keyed factories and identity-keyed device handlers.
///
/// Both maps sit behind their own lock, so registration may run
/// concurrently with lookups. Factories run outside any lock.
pub struct DeviceRegistry {
    classes: RwLock<HashMap<String, DeviceFactory>>,
    devices: RwLock<HashMap<u64, Arc<dyn Device>>>,
    policy: RegistryPolicy,
}

impl DeviceRegistry {
    /// Create an empty registry with the default (overwriting) policy.
    pub fn new() -> Self {
        Self::with_policy(RegistryPolicy::default())
    }

    pub fn with_policy(policy: RegistryPolicy) -> Self {
        Self {
            classes: RwLock::new(HashMap::new()),
            devices: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Attach a device class. The last factory registered under an
    /// identifier wins unless the policy rejects duplicates.
    pub fn register_class<F>(&self, class_id: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&serde_yaml::Value, &Capabilities) -> std::result::Result<Arc<dyn Device>, DeviceError>
            + Send
            + Sync
            + 'static,
    {
        let class_id = class_id.into();
        let mut classes = write(&self.classes);
        if self.policy.reject_duplicate_classes && classes.contains_key(&class_id) {
            return Err(RegistryError::DuplicateClass(class_id));
        }
        debug!(class = %class_id, "device class registered");
        classes.insert(class_id, Arc::new(factory));
        Ok(())
    }

    /// Build a device from `raw` with the factory for `class_id` and store
    /// it under its own identity.
    pub fn register_device(
        &self,
        class_id: &str,
        raw: &serde_yaml::Value,
        caps: &Capabilities,
    ) -> Result<Arc<dyn Device>> {
        let factory = read(&self.classes)
            .get(class_id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownClass(class_id.to_string()))?;

        let device = factory(raw, caps).map_err(|source| RegistryError::InvalidConfig {
            class: class_id.to_string(),
            source,
        })?;

        {
            let mut devices = write(&self.devices);
            if self.policy.reject_duplicate_ids && devices.contains_key(&device.id()) {
                return Err(RegistryError::DuplicateDevice(device.id()));
            }
            devices.insert(device.id(), Arc::clone(&device));
        }

        info!(
            class = device.class_name(),
            name = device.name(),
            id = device.id(),
            "added device"
        );
        Ok(device)
    }

    pub fn lookup(&self, id: u64) -> Option<Arc<dyn Device>> {
        read(&self.devices).get(&id).cloned()
    }

    pub fn has_class(&self, class_id: &str) -> bool {
        read(&self.classes).contains_key(class_id)
    }

    /// Registered class identifiers, sorted.
    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = read(&self.classes).keys().cloned().collect();
        classes.sort_unstable();
        classes
    }

    /// Registered devices, sorted by identity.
    pub fn devices(&self) -> Vec<Arc<dyn Device>> {
        let mut devices: Vec<Arc<dyn Device>> = read(&self.devices).values().cloned().collect();
        devices.sort_unstable_by_key(|device| device.id());
        devices
    }

    pub fn len(&self) -> usize {
        read(&self.devices).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every device; classes stay registered.
    pub fn clear_devices(&self) {
        write(&self.devices).clear();
    }

    /// Start every device's background listeners.
    pub fn start_all(
        &self,
        caps: &Capabilities,
        shutdown: &CancellationToken,
    ) -> Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();
        for device in self.devices() {
            let id = device.id();
            if let Some(handle) = device
                .start(caps, shutdown.clone())
                .map_err(|source| RegistryError::Start { id, source })?
            {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    /// Persisted configuration of every device, grouped by class identifier.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Vec<serde_yaml::Value>>> {
        let mut grouped: BTreeMap<String, Vec<serde_yaml::Value>> = BTreeMap::new();
        for device in self.devices() {
            let value = device.snapshot().map_err(|source| RegistryError::Snapshot {
                id: device.id(),
                source,
            })?;
            grouped
                .entry(device.class_id().to_string())
                .or_default()
                .push(value);
        }
        Ok(grouped)
    }

    pub fn policy(&self) -> RegistryPolicy {
        self.policy
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// A panicking factory must not take the registry down with it.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::probe::{probe_config, register_probe, PROBE_CLASS};

    #[test]
    fn register_and_lookup() {
        let registry = DeviceRegistry::new();
        register_probe(&registry);
        let caps = Capabilities::disabled();

        let device = registry
            .register_device(PROBE_CLASS, &probe_config(0x1234, "porch"), &caps)
            .unwrap();
        assert_eq!(device.id(), 0x1234);
        assert_eq!(device.class_name(), "Probe");

        let found = registry.lookup(0x1234).unwrap();
        assert_eq!(found.name(), "porch");
        assert!(registry.lookup(0x9999).is_none());
    }

    #[test]
    fn unknown_class_is_rejected() {
        let registry = DeviceRegistry::new();
        let err = registry
            .register_device("urn:missing", &probe_config(1, "x"), &Capabilities::disabled())
            .err().expect("expected registration error");
        assert!(matches!(err, RegistryError::UnknownClass(class) if class == "urn:missing"));
        assert!(registry.is_empty());
    }

    #[test]
    fn factory_failure_is_invalid_config() {
        let registry = DeviceRegistry::new();
        register_probe(&registry);
        let raw: serde_yaml::Value = serde_yaml::from_str("id: 1\nkey: nothex").unwrap();
        let err = registry
            .register_device(PROBE_CLASS, &raw, &Capabilities::disabled())
            .err().expect("expected registration error");
        assert!(matches!(
            err,
            RegistryError::InvalidConfig { ref class, source: DeviceError::Frame(_) } if class == PROBE_CLASS
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn second_class_factory_wins() {
        let registry = DeviceRegistry::new();
        registry
            .register_class(PROBE_CLASS, |_, _| {
                Err(DeviceError::Config("first factory".into()))
            })
            .unwrap();
        register_probe(&registry);

        assert_eq!(registry.classes(), vec![PROBE_CLASS.to_string()]);
        registry
            .register_device(PROBE_CLASS, &probe_config(1, "x"), &Capabilities::disabled())
            .unwrap();
    }

    #[test]
    fn second_device_with_same_id_wins() {
        let registry = DeviceRegistry::new();
        register_probe(&registry);
        let caps = Capabilities::disabled();

        registry
            .register_device(PROBE_CLASS, &probe_config(5, "first"), &caps)
            .unwrap();
        registry
            .register_device(PROBE_CLASS, &probe_config(5, "second"), &caps)
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(5).unwrap().name(), "second");
    }

    #[test]
    fn strict_policy_rejects_duplicates() {
        let registry = DeviceRegistry::with_policy(RegistryPolicy::strict());
        register_probe(&registry);
        let err = registry
            .register_class(PROBE_CLASS, |_, _| Err(DeviceError::Config("late".into())))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateClass(_)));

        let caps = Capabilities::disabled();
        registry
            .register_device(PROBE_CLASS, &probe_config(5, "first"), &caps)
            .unwrap();
        let err = registry
            .register_device(PROBE_CLASS, &probe_config(5, "second"), &caps)
            .err().expect("expected registration error");
        assert!(matches!(err, RegistryError::DuplicateDevice(5)));
        assert_eq!(registry.lookup(5).unwrap().name(), "first");
    }

    #[test]
    fn devices_are_sorted_and_clearable() {
        let registry = DeviceRegistry::new();
        register_probe(&registry);
        let caps = Capabilities::disabled();
        for id in [30, 10, 20] {
            registry
                .register_device(PROBE_CLASS, &probe_config(id, "d"), &caps)
                .unwrap();
        }
        let ids: Vec<u64> = registry.devices().iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![10, 20, 30]);

        registry.clear_devices();
        assert!(registry.is_empty());
        assert!(registry.has_class(PROBE_CLASS));
    }

    #[test]
    fn snapshot_groups_by_class() {
        let registry = DeviceRegistry::new();
        register_probe(&registry);
        let caps = Capabilities::disabled();
        registry
            .register_device(PROBE_CLASS, &probe_config(2, "b"), &caps)
            .unwrap();
        registry
            .register_device(PROBE_CLASS, &probe_config(1, "a"), &caps)
            .unwrap();

        let snapshot = registry.snapshot().unwrap();
        let entries = &snapshot[PROBE_CLASS];
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], serde_yaml::Value::from("a"));
    }

    #[test]
    fn concurrent_register_and_lookup() {
        let registry = Arc::new(DeviceRegistry::new());
        register_probe(&registry);
        let caps = Capabilities::disabled();
        registry
            .register_device(PROBE_CLASS, &probe_config(u64::MAX, "anchor"), &caps)
            .unwrap();

        let mut workers = Vec::new();
        for worker in 0..4u64 {
            let registry = Arc::clone(&registry);
            let caps = caps.clone();
            workers.push(thread::spawn(move || {
                for n in 0..50u64 {
                    let id = worker * 1000 + n;
                    registry
                        .register_device(PROBE_CLASS, &probe_config(id, "w"), &caps)
                        .unwrap();
                }
            }));
        }
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            workers.push(thread::spawn(move || {
                for _ in 0..200 {
                    assert_eq!(registry.lookup(u64::MAX).unwrap().name(), "anchor");
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(registry.len(), 4 * 50 + 1);
    }
}
