use super::*;
use serde_json::json;

fn device_topic(device: &str, endpoint: Option<&str>) -> Topic {
    Topic::DeviceState {
        room: "kitchen".to_string(),
        device: device.to_string(),
        endpoint: endpoint.map(|e| e.to_string()),
    }
}

fn sensor(temperature: Option<f64>, humidity: Option<f64>, battery: Option<f64>) -> NormalizedEvent {
    NormalizedEvent::new(
        "sensor1",
        "kitchen",
        DeviceState::Sensor {
            temperature,
            humidity,
            battery,
        },
    )
}

fn dimmer(power: Power, brightness: u32) -> NormalizedEvent {
    NormalizedEvent::new(
        "lamp1",
        "kitchen",
        DeviceState::LightDimmer {
            power,
            brightness,
            color: None,
        },
    )
}

#[test]
fn test_single_dimmer_payload() {
    let events = normalize(
        &device_topic("lamp1", None),
        &json!({"state": "on", "brightness": 80, "color": {"x": 0.3, "y": 0.4}}),
    )
    .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].device_key, "lamp1");
    assert_eq!(events[0].room, "kitchen");
    assert_eq!(
        events[0].state,
        DeviceState::LightDimmer {
            power: Power::On,
            brightness: 80,
            color: Some("x=0.3,y=0.4".to_string()),
        }
    );
}

#[test]
fn test_dimmer_on_endpoint_topic_uses_endpoint_key() {
    let events = normalize(&device_topic("dimmer", Some("l2")), &json!({"brightness": 10})).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].device_key, "dimmer/l2");
    // Missing state reads as OFF
    assert_eq!(events[0].status(), Some("OFF"));
}

#[test]
fn test_dual_dimmer_splits_per_channel() {
    let events = normalize(
        &device_topic("dimmer", None),
        &json!({"state_l1": "ON", "brightness_l1": 200, "brightness_l2": 5}),
    )
    .unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].device_key, "dimmer/l1");
    assert_eq!(events[0].status(), Some("ON"));
    assert_eq!(events[1].device_key, "dimmer/l2");
    assert_eq!(events[1].status(), Some("OFF"));
    assert_eq!(
        events[1].state,
        DeviceState::LightDimmer {
            power: Power::Off,
            brightness: 5,
            color: None,
        }
    );
}

#[test]
fn test_dual_dimmer_bad_channel_keeps_sibling() {
    let events = normalize(
        &device_topic("dimmer", None),
        &json!({"state_l1": "ON", "brightness_l1": -5, "state_l2": "ON", "brightness_l2": 50}),
    )
    .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].device_key, "dimmer/l2");
    assert_eq!(
        events[0].state,
        DeviceState::LightDimmer {
            power: Power::On,
            brightness: 50,
            color: None,
        }
    );
}

#[test]
fn test_dual_switch_splits_per_channel() {
    let events = normalize(
        &device_topic("switch1", None),
        &json!({"state_l1": "ON", "state_l2": "OFF", "linkquality": 90}),
    )
    .unwrap();

    let keys: Vec<&str> = events.iter().map(|e| e.device_key.as_str()).collect();
    assert_eq!(keys, vec!["switch1/l1", "switch1/l2"]);
    assert!(events.iter().all(|e| e.device_class() == DeviceClass::PowerSwitch));
}

#[test]
fn test_switch_state_variants() {
    let on_bool = normalize(&device_topic("plug", None), &json!({"state": true})).unwrap();
    assert_eq!(on_bool[0].state, DeviceState::PowerSwitch { power: Power::On });

    let off_str = normalize(&device_topic("plug", None), &json!({"state": "toggle"})).unwrap();
    assert_eq!(off_str[0].state, DeviceState::PowerSwitch { power: Power::Off });
}

#[test]
fn test_sensor_classes() {
    let climate = normalize(
        &device_topic("sensor1", None),
        &json!({"temperature": 21.4, "humidity": "45", "battery": 90}),
    )
    .unwrap();
    assert_eq!(climate[0], sensor(Some(21.4), Some(45.0), Some(90.0)));

    let door = normalize(&device_topic("door", None), &json!({"contact": false, "battery": 80})).unwrap();
    assert_eq!(door[0].device_class(), DeviceClass::Contact);
    assert_eq!(door[0].status(), Some("open"));

    let hall = normalize(
        &device_topic("pir", None),
        &json!({"occupancy": true, "battery": 70, "voltage": 3000}),
    )
    .unwrap();
    assert_eq!(hall[0].device_class(), DeviceClass::Motion);
    assert_eq!(hall[0].status(), Some("detected"));
}

#[test]
fn test_unrecognised_payload_yields_nothing() {
    let events = normalize(&device_topic("thing", None), &json!({"linkquality": 120})).unwrap();
    assert!(events.is_empty());
}

#[test]
fn test_non_object_payload_fails() {
    let result = normalize(&device_topic("lamp1", None), &json!([1, 2, 3]));
    assert_eq!(result.unwrap_err(), NormalizeError::NotAnObject);
}

#[test]
fn test_non_device_topic_fails() {
    let result = normalize(&Topic::Command, &json!({"state": "ON"}));
    assert_eq!(result.unwrap_err(), NormalizeError::NotDeviceTopic);
}

#[test]
fn test_invalid_numeric_field_fails() {
    let result = normalize(&device_topic("sensor1", None), &json!({"temperature": "warm"}));
    assert!(matches!(
        result,
        Err(NormalizeError::InvalidField { ref field, .. }) if field == "temperature"
    ));
}

#[test]
fn test_dimmer_equality_uses_power_and_brightness() {
    assert!(dimmer(Power::On, 80).same_state(&dimmer(Power::On, 80)));
    assert!(!dimmer(Power::On, 80).same_state(&dimmer(Power::On, 60)));
    assert!(!dimmer(Power::On, 80).same_state(&dimmer(Power::Off, 80)));
}

#[test]
fn test_sensor_equality_truncates_to_whole_units() {
    let base = sensor(Some(21.4), Some(45.2), Some(90.0));

    assert!(base.same_state(&sensor(Some(21.6), Some(45.9), Some(90.0))));
    assert!(!base.same_state(&sensor(Some(22.1), Some(45.2), Some(90.0))));
    assert!(!sensor(Some(21.9), None, None).same_state(&sensor(Some(22.1), None, None)));
    // Battery compares strictly
    assert!(!base.same_state(&sensor(Some(21.4), Some(45.2), Some(89.5))));
}

#[test]
fn test_missing_fields_compare_gracefully() {
    assert!(sensor(None, None, None).same_state(&sensor(None, None, None)));
    assert!(!sensor(Some(20.0), None, None).same_state(&sensor(None, None, None)));
}

#[test]
fn test_motion_equality_includes_voltage() {
    let motion = |voltage: Option<f64>| {
        NormalizedEvent::new(
            "pir",
            "hall",
            DeviceState::Motion {
                occupancy: Occupancy::Cleared,
                battery: Some(70.0),
                voltage,
            },
        )
    };
    assert!(motion(Some(3000.0)).same_state(&motion(Some(3000.0))));
    assert!(!motion(Some(3000.0)).same_state(&motion(Some(2900.0))));
}

#[test]
fn test_other_class_defaults_brightness_to_zero() {
    let other = |brightness: Option<u32>| {
        NormalizedEvent::new(
            "gadget",
            "hall",
            DeviceState::Other {
                status: "idle".to_string(),
                brightness,
            },
        )
    };
    assert!(other(None).same_state(&other(Some(0))));
    assert!(!other(None).same_state(&other(Some(10))));
}

#[test]
fn test_different_classes_never_equal() {
    let switch = NormalizedEvent::new("lamp1", "kitchen", DeviceState::PowerSwitch { power: Power::On });
    assert!(!switch.same_state(&dimmer(Power::On, 0)));
}

#[test]
fn test_status_keys() {
    assert_eq!(dimmer(Power::On, 80).status_key(), "ON");
    assert_eq!(
        sensor(Some(20.0), Some(45.0), None).status_key(),
        "T=20;H=45;B=none"
    );

    let contact = NormalizedEvent::new(
        "door",
        "hall",
        DeviceState::Contact {
            state: ContactState::Closed,
            battery: Some(80.0),
        },
    );
    assert_eq!(contact.status_key(), "S=closed;B=80");
}

#[test]
fn test_params_flatten_class_fields() {
    let params = dimmer(Power::On, 80).to_params();

    assert!(params.contains(&("device", "lamp1".to_string())));
    assert!(params.contains(&("type", "light_dimmer".to_string())));
    assert!(params.contains(&("status", "ON".to_string())));
    assert!(params.contains(&("brightness", "80".to_string())));

    let params = sensor(Some(20.5), None, Some(90.0)).to_params();
    assert!(params.contains(&("temperature", "20.5".to_string())));
    assert!(!params.iter().any(|(k, _)| *k == "humidity"));
    assert!(!params.iter().any(|(k, _)| *k == "status"));
}
