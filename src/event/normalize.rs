use super::topic::Topic;
use super::{ContactState, DeviceState, NormalizedEvent, Occupancy, Power};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// Errors raised while turning a device payload into normalized events
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeError {
    NotDeviceTopic,
    NotAnObject,
    InvalidField { field: String, value: String },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::NotDeviceTopic => write!(f, "topic does not address a device"),
            NormalizeError::NotAnObject => write!(f, "payload must be a JSON object"),
            NormalizeError::InvalidField { field, value } => {
                write!(f, "field '{}' has unusable value {}", field, value)
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

const BRIGHTNESS_KEYS: [&str; 3] = ["brightness", "brightness_l1", "brightness_l2"];
const STATE_KEYS: [&str; 3] = ["state", "state_l1", "state_l2"];
const DUAL_KEYS: [&str; 4] = ["state_l1", "state_l2", "brightness_l1", "brightness_l2"];
const ENDPOINTS: [&str; 2] = ["l1", "l2"];

/// Normalize a device-state payload into zero or more events.
///
/// The class is inferred from which keys the payload carries:
/// - any brightness key: light dimmer
/// - otherwise any state key: power switch
/// - otherwise temperature/humidity, contact or occupancy: sensor classes
///
/// Dual-channel payloads (`state_l1`, `brightness_l2`, ...) yield one event
/// per channel keyed `device/l1`, `device/l2`. A payload with nothing
/// recognisable yields an empty vec.
pub fn normalize(topic: &Topic, payload: &Value) -> Result<Vec<NormalizedEvent>, NormalizeError> {
    let Topic::DeviceState {
        room,
        device,
        endpoint,
    } = topic
    else {
        return Err(NormalizeError::NotDeviceTopic);
    };
    let fields = payload.as_object().ok_or(NormalizeError::NotAnObject)?;

    let single_key = match endpoint {
        Some(ep) => format!("{}/{}", device, ep),
        None => device.clone(),
    };

    if has_any(fields, &BRIGHTNESS_KEYS) {
        return dimmer_events(room, device, &single_key, fields);
    }
    if has_any(fields, &STATE_KEYS) {
        return switch_events(room, device, &single_key, fields);
    }
    sensor_event(room, device, fields).map(|event| event.into_iter().collect())
}

fn dimmer_events(
    room: &str,
    device: &str,
    single_key: &str,
    fields: &Map<String, Value>,
) -> Result<Vec<NormalizedEvent>, NormalizeError> {
    let mut events = Vec::new();

    if has_any(fields, &DUAL_KEYS) {
        for ep in ENDPOINTS {
            let state_key = format!("state_{}", ep);
            let brightness_key = format!("brightness_{}", ep);
            if !fields.contains_key(&state_key) && !fields.contains_key(&brightness_key) {
                continue;
            }
            let device_key = format!("{}/{}", device, ep);
            // A bad channel is dropped on its own; its sibling still reports
            let brightness = match brightness_field(&brightness_key, fields.get(&brightness_key)) {
                Ok(brightness) => brightness,
                Err(e) => {
                    warn!(device_key = %device_key, error = %e, "Skipping dimmer channel");
                    continue;
                }
            };
            events.push(NormalizedEvent::new(
                device_key,
                room,
                DeviceState::LightDimmer {
                    power: power_field(fields.get(&state_key)),
                    brightness,
                    color: None,
                },
            ));
        }
        return Ok(events);
    }

    events.push(NormalizedEvent::new(
        single_key,
        room,
        DeviceState::LightDimmer {
            power: power_field(fields.get("state")),
            brightness: brightness_field("brightness", fields.get("brightness"))?,
            color: fields.get("color").and_then(color_descriptor),
        },
    ));
    Ok(events)
}

fn switch_events(
    room: &str,
    device: &str,
    single_key: &str,
    fields: &Map<String, Value>,
) -> Result<Vec<NormalizedEvent>, NormalizeError> {
    let mut events = Vec::new();

    if let Some(state) = fields.get("state") {
        events.push(NormalizedEvent::new(
            single_key,
            room,
            DeviceState::PowerSwitch {
                power: power_field(Some(state)),
            },
        ));
    }
    for ep in ENDPOINTS {
        if let Some(state) = fields.get(&format!("state_{}", ep)) {
            events.push(NormalizedEvent::new(
                format!("{}/{}", device, ep),
                room,
                DeviceState::PowerSwitch {
                    power: power_field(Some(state)),
                },
            ));
        }
    }

    Ok(events)
}

fn sensor_event(
    room: &str,
    device: &str,
    fields: &Map<String, Value>,
) -> Result<Option<NormalizedEvent>, NormalizeError> {
    let state = if fields.contains_key("temperature") || fields.contains_key("humidity") {
        DeviceState::Sensor {
            temperature: number_field("temperature", fields.get("temperature"))?,
            humidity: number_field("humidity", fields.get("humidity"))?,
            battery: number_field("battery", fields.get("battery"))?,
        }
    } else if let Some(contact) = fields.get("contact") {
        // contact=true means the magnet is present, i.e. closed
        DeviceState::Contact {
            state: if flag_field("contact", contact)? {
                ContactState::Closed
            } else {
                ContactState::Open
            },
            battery: number_field("battery", fields.get("battery"))?,
        }
    } else if let Some(occupancy) = fields.get("occupancy") {
        DeviceState::Motion {
            occupancy: if flag_field("occupancy", occupancy)? {
                Occupancy::Detected
            } else {
                Occupancy::Cleared
            },
            battery: number_field("battery", fields.get("battery"))?,
            voltage: number_field("voltage", fields.get("voltage"))?,
        }
    } else {
        return Ok(None);
    };

    Ok(Some(NormalizedEvent::new(device, room, state)))
}

fn has_any(fields: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|k| fields.contains_key(*k))
}

/// Missing or unrecognised states read as OFF.
fn power_field(value: Option<&Value>) -> Power {
    let on = match value {
        Some(Value::String(s)) => s.eq_ignore_ascii_case("on"),
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n > 0.0),
        _ => false,
    };
    if on {
        Power::On
    } else {
        Power::Off
    }
}

fn brightness_field(field: &str, value: Option<&Value>) -> Result<u32, NormalizeError> {
    match number_field(field, value)? {
        Some(n) if n >= 0.0 => Ok(n.round().min(u32::MAX as f64) as u32),
        Some(_) => Err(invalid(field, value)),
        None => Ok(0),
    }
}

fn number_field(field: &str, value: Option<&Value>) -> Result<Option<f64>, NormalizeError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| invalid(field, value)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(field, value)),
        Some(_) => Err(invalid(field, value)),
    }
}

fn flag_field(field: &str, value: &Value) -> Result<bool, NormalizeError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
        _ => Err(invalid(field, Some(value))),
    }
}

/// `{x, y}` or `{r, g, b}` color objects become a short descriptor string.
fn color_descriptor(color: &Value) -> Option<String> {
    let obj = color.as_object()?;
    if let (Some(x), Some(y)) = (obj.get("x"), obj.get("y")) {
        return Some(format!("x={},y={}", x, y));
    }
    if let (Some(r), Some(g), Some(b)) = (obj.get("r"), obj.get("g"), obj.get("b")) {
        return Some(format!("r={},g={},b={}", r, g, b));
    }
    None
}

fn invalid(field: &str, value: Option<&Value>) -> NormalizeError {
    NormalizeError::InvalidField {
        field: field.to_string(),
        value: value.map_or_else(|| "null".to_string(), |v| v.to_string()),
    }
}
