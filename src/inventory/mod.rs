//! Bridge-wide device inventory.
//!
//! Turns the coordinator's `bridge/devices` list into a simplified inventory
//! (room, simplified type, capabilities, endpoints) for listeners, and keeps
//! the latest one around for the status API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use tracing::{debug, info};


/// Device-level keys copied into an inventory entry's parameters
const PARAMETER_KEYS: [&str; 18] = [
    "state",
    "brightness",
    "color",
    "temperature",
    "humidity",
    "pressure",
    "illuminance",
    "contact",
    "occupancy",
    "battery",
    "voltage",
    "power",
    "energy",
    "current",
    "state_l1",
    "state_l2",
    "brightness_l1",
    "brightness_l2",
];

/// Simplified device type reported to listeners
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    RgbLight,
    Dimmer,
    Switch,
    TemperatureSensor,
    ContactSensor,
    MotionSensor,
    SmartPlug,
    Sensor,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::RgbLight => "rgb_light",
            DeviceType::Dimmer => "dimmer",
            DeviceType::Switch => "switch",
            DeviceType::TemperatureSensor => "temperature_sensor",
            DeviceType::ContactSensor => "contact_sensor",
            DeviceType::MotionSensor => "motion_sensor",
            DeviceType::SmartPlug => "smart_plug",
            DeviceType::Sensor => "sensor",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Endpoint {
    pub endpoint: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeviceDescriptor {
    pub room: String,
    pub name: String,
    pub device_type: DeviceType,
    pub zigbee_type: String,
    pub parameters: Map<String, Value>,
    pub endpoints: Vec<Endpoint>,
    pub endpoint_count: usize,
    /// Always true: channels are reported as endpoints, never as devices
    pub is_main_device: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct InventorySummary {
    pub by_room: BTreeMap<String, usize>,
    pub by_device_type: BTreeMap<String, usize>,
    pub rooms: Vec<String>,
}

/// Inventory sent to listeners on every device-list publication
#[derive(Clone, Debug, Serialize)]
pub struct DeviceInventory {
    pub timestamp: DateTime<Utc>,
    pub devices: Vec<DeviceDescriptor>,
    pub total_devices: usize,
    pub summary: InventorySummary,
}

/// Build an inventory from a device-list payload.
///
/// Only supported devices whose friendly name has the form
/// `<base>/<room>/<name>` are kept. Returns `None` when the payload is not a
/// list.
pub fn build_inventory(payload: &Value) -> Option<DeviceInventory> {
    let entries = payload.as_array()?;

    let devices: Vec<DeviceDescriptor> = entries.iter().filter_map(describe_device).collect();

    let mut summary = InventorySummary::default();
    for device in &devices {
        *summary.by_room.entry(device.room.clone()).or_default() += 1;
        *summary
            .by_device_type
            .entry(device.device_type.as_str().to_string())
            .or_default() += 1;
    }
    summary.rooms = summary.by_room.keys().cloned().collect();

    Some(DeviceInventory {
        timestamp: Utc::now(),
        total_devices: devices.len(),
        devices,
        summary,
    })
}

fn describe_device(entry: &Value) -> Option<DeviceDescriptor> {
    let device = entry.as_object()?;
    let friendly_name = device.get("friendly_name")?.as_str()?;
    if !device.get("supported").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }

    let Some(room) = room_of(friendly_name) else {
        debug!(friendly_name = %friendly_name, "Skipping device outside room naming scheme");
        return None;
    };

    let exposes = device
        .get("definition")
        .and_then(|d| d.get("exposes"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let endpoints = exposes.iter().filter_map(endpoint_of).collect::<Vec<_>>();
    let parameters = extract_parameters(device, exposes);
    let capabilities = exposed_properties(exposes);
    let zigbee_type = device
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("Router")
        .to_string();

    Some(DeviceDescriptor {
        room: room.to_string(),
        name: friendly_name.to_string(),
        device_type: map_device_type(&zigbee_type, &parameters, &capabilities),
        zigbee_type,
        endpoint_count: endpoints.len(),
        is_main_device: true,
        endpoints,
        parameters,
    })
}

/// Room segment of `<base>/<room>/<name>`.
fn room_of(friendly_name: &str) -> Option<&str> {
    let mut parts = friendly_name.splitn(3, '/');
    let base = parts.next()?;
    let room = parts.next()?;
    let name = parts.next()?;
    if base.is_empty() || room.is_empty() || name.is_empty() {
        return None;
    }
    Some(room)
}

fn endpoint_of(expose: &Value) -> Option<Endpoint> {
    let endpoint = expose.get("endpoint")?.as_str()?;
    let features = expose.get("features")?.as_array()?;
    Some(Endpoint {
        endpoint: endpoint.to_string(),
        kind: expose
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        features: features
            .iter()
            .filter_map(|f| {
                f.get("name")
                    .or_else(|| f.get("property"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect(),
    })
}

fn extract_parameters(device: &Map<String, Value>, exposes: &[Value]) -> Map<String, Value> {
    let mut parameters = Map::new();

    for key in PARAMETER_KEYS {
        if let Some(value) = device.get(key).filter(|v| !v.is_null()) {
            parameters.insert(key.to_string(), value.clone());
        }
    }

    for expose in exposes {
        let property = expose.get("property").and_then(Value::as_str);
        let has_color_feature = expose
            .get("features")
            .and_then(Value::as_array)
            .is_some_and(|features| {
                features.iter().any(|f| {
                    f.get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|name| name.contains("color"))
                })
            });

        if property == Some("color")
            || expose.get("name").and_then(Value::as_str) == Some("color_xy")
            || has_color_feature
        {
            parameters.insert("rgb_supported".to_string(), Value::Bool(true));
        }
        if property == Some("color_temp") {
            parameters.insert("color_temp_supported".to_string(), Value::Bool(true));
            if let Some(temp) = device.get("color_temp").filter(|v| !v.is_null()) {
                parameters.insert("color_temp".to_string(), temp.clone());
            }
        }
        if property == Some("color_mode") {
            if let Some(mode) = device.get("color_mode") {
                parameters.insert("color_mode".to_string(), mode.clone());
            }
        }
    }

    parameters
}

/// Every property named by an expose or one of its features.
fn exposed_properties(exposes: &[Value]) -> BTreeSet<String> {
    let mut properties = BTreeSet::new();
    for expose in exposes {
        if let Some(p) = expose.get("property").and_then(Value::as_str) {
            properties.insert(p.to_string());
        }
        for feature in expose
            .get("features")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(p) = feature.get("property").and_then(Value::as_str) {
                properties.insert(p.to_string());
            }
        }
    }
    properties
}

fn map_device_type(
    zigbee_type: &str,
    parameters: &Map<String, Value>,
    capabilities: &BTreeSet<String>,
) -> DeviceType {
    let has = |key: &str| parameters.contains_key(key) || capabilities.contains(key);

    if parameters.contains_key("rgb_supported") {
        DeviceType::RgbLight
    } else if has("brightness") {
        DeviceType::Dimmer
    } else if has("state") {
        DeviceType::Switch
    } else if has("temperature") || has("humidity") {
        DeviceType::TemperatureSensor
    } else if has("contact") {
        DeviceType::ContactSensor
    } else if has("occupancy") {
        DeviceType::MotionSensor
    } else if has("power") || has("energy") {
        DeviceType::SmartPlug
    } else if zigbee_type == "EndDevice" {
        DeviceType::Sensor
    } else {
        DeviceType::Switch
    }
}

/// Latest inventory plus every room seen since startup
#[derive(Default)]
pub struct DeviceDirectory {
    latest: RwLock<Option<DeviceInventory>>,
    rooms: RwLock<BTreeSet<String>>,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `inventory` as the latest and merge its rooms into the known set.
    pub fn update(&self, inventory: &DeviceInventory) {
        {
            let mut rooms = self.rooms.write().expect("room set lock poisoned");
            let before = rooms.len();
            rooms.extend(inventory.summary.rooms.iter().cloned());
            if rooms.len() > before {
                info!(rooms = ?*rooms, "Known rooms updated");
            }
        }

        *self.latest.write().expect("inventory lock poisoned") = Some(inventory.clone());
    }

    pub fn latest(&self) -> Option<DeviceInventory> {
        self.latest.read().expect("inventory lock poisoned").clone()
    }

    pub fn rooms(&self) -> Vec<String> {
        self.rooms
            .read()
            .expect("room set lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}
