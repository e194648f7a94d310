use std::sync::Arc;

use lorahome_caps::testing::Recorder;
use lorahome_devices::proto::{Humidity, MultiSensorStatus, Temperature};
use lorahome_devices::{register_builtin, LED_STRIP_CLASS, LOVEHEART_CLASS, MULTISENSOR_CLASS};
use lorahome_frame::{seal_envelope, FrameKey};
use lorahome_registry::{DeviceRegistry, DispatchError, Dispatcher, RegistryError};
use prost::Message;

const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";

fn registry() -> Arc<DeviceRegistry> {
    let registry = Arc::new(DeviceRegistry::new());
    register_builtin(&registry).unwrap();
    registry
}

fn multisensor_config() -> serde_yaml::Value {
    serde_yaml::from_str(&format!(
        "id: 0x1234\nname: porch\nkey: {KEY}\ninfluxdb:\n  database: home\nmqtt:\n  topics:\n    temperature: porch/temperature\n"
    ))
    .unwrap()
}

#[test]
fn builtin_classes_are_registered() {
    let registry = registry();
    let mut expected = vec![
        LED_STRIP_CLASS.to_string(),
        LOVEHEART_CLASS.to_string(),
        MULTISENSOR_CLASS.to_string(),
    ];
    expected.sort();
    assert_eq!(registry.classes(), expected);
}

#[tokio::test]
async fn sealed_envelope_reaches_multisensor() {
    let rec = Recorder::new();
    let registry = registry();
    registry
        .register_device(MULTISENSOR_CLASS, &multisensor_config(), &rec.caps)
        .unwrap();
    let dispatcher = Dispatcher::new(Arc::clone(&registry), rec.caps.clone());

    let status = MultiSensorStatus {
        temperature: Some(Temperature {
            value_c: 19.0,
            value_f: 66.2,
        }),
        humidity: Some(Humidity { value: 51.0 }),
        ..Default::default()
    };
    let key = FrameKey::from_hex(KEY).unwrap();
    let packet = seal_envelope(0x1234, &key, &status.encode_to_vec()).unwrap();

    assert_eq!(dispatcher.dispatch(&packet).await.unwrap(), 0x1234);

    assert_eq!(rec.writer.point_count(), 2);
    assert_eq!(
        rec.pubsub.last_value("porch/temperature").as_deref(),
        Some("19.0")
    );
}

#[tokio::test]
async fn envelope_for_other_device_is_unknown() {
    let rec = Recorder::new();
    let registry = registry();
    registry
        .register_device(MULTISENSOR_CLASS, &multisensor_config(), &rec.caps)
        .unwrap();
    let dispatcher = Dispatcher::new(registry, rec.caps.clone());

    let key = FrameKey::from_hex(KEY).unwrap();
    let packet = seal_envelope(0x4321, &key, b"").unwrap();

    let err = dispatcher.dispatch(&packet).await.unwrap_err();
    assert!(matches!(err, DispatchError::UnknownDevice(0x4321)));
    assert_eq!(rec.writer.point_count(), 0);
}

#[tokio::test]
async fn tampered_frame_is_a_device_error() {
    let rec = Recorder::new();
    let registry = registry();
    registry
        .register_device(MULTISENSOR_CLASS, &multisensor_config(), &rec.caps)
        .unwrap();
    let dispatcher = Dispatcher::new(registry, rec.caps.clone());

    let key = FrameKey::from_hex(KEY).unwrap();
    let mut packet = seal_envelope(0x1234, &key, &[1, 2, 3]).unwrap().to_vec();
    packet.truncate(packet.len() - 1);

    let err = dispatcher.dispatch(&packet).await.unwrap_err();
    assert!(matches!(err, DispatchError::Device { id: 0x1234, .. }));
}

#[test]
fn malformed_device_config_is_invalid_config() {
    let rec = Recorder::new();
    let registry = registry();
    let raw: serde_yaml::Value = serde_yaml::from_str("id: 9\nkey: 0011").unwrap();

    let err = registry
        .register_device(LOVEHEART_CLASS, &raw, &rec.caps)
        .err()
        .unwrap();

    assert!(matches!(err, RegistryError::InvalidConfig { .. }));
    assert!(registry.lookup(9).is_none());
}
