use serde::{Deserialize, Serialize};
use std::fmt;

mod normalize;
mod topic;
#[cfg(test)]
mod tests;

pub use normalize::{normalize, NormalizeError};
pub use topic::{Topic, CLIENT_ANNOUNCE_TOPIC};

/// Closed set of device behaviours. Determines which fields matter when two
/// observations of the same device are compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    LightDimmer,
    PowerSwitch,
    Sensor,
    Contact,
    Motion,
    Other,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::LightDimmer => "light_dimmer",
            DeviceClass::PowerSwitch => "power_switch",
            DeviceClass::Sensor => "sensor",
            DeviceClass::Contact => "contact",
            DeviceClass::Motion => "motion",
            DeviceClass::Other => "other",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Power {
    On,
    Off,
}

impl Power {
    pub fn as_str(&self) -> &'static str {
        match self {
            Power::On => "ON",
            Power::Off => "OFF",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactState {
    Closed,
    Open,
}

impl ContactState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactState::Closed => "closed",
            ContactState::Open => "open",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Occupancy {
    Detected,
    Cleared,
}

impl Occupancy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Occupancy::Detected => "detected",
            Occupancy::Cleared => "cleared",
        }
    }
}

/// Class-specific reportable state. Each variant carries only the fields its
/// class reports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceState {
    LightDimmer {
        power: Power,
        brightness: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    PowerSwitch {
        power: Power,
    },
    Sensor {
        temperature: Option<f64>,
        humidity: Option<f64>,
        battery: Option<f64>,
    },
    Contact {
        state: ContactState,
        battery: Option<f64>,
    },
    Motion {
        occupancy: Occupancy,
        battery: Option<f64>,
        voltage: Option<f64>,
    },
    Other {
        status: String,
        brightness: Option<u32>,
    },
}

/// A single device observation, already resolved from topic and payload.
///
/// `device_key` is the base device name, or `name/endpoint` for one channel
/// of a dual-channel device (e.g. `switch1/l1`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub device_key: String,
    pub room: String,
    pub state: DeviceState,
}

impl NormalizedEvent {
    pub fn new(device_key: impl Into<String>, room: impl Into<String>, state: DeviceState) -> Self {
        Self {
            device_key: device_key.into(),
            room: room.into(),
            state,
        }
    }

    pub fn device_class(&self) -> DeviceClass {
        match self.state {
            DeviceState::LightDimmer { .. } => DeviceClass::LightDimmer,
            DeviceState::PowerSwitch { .. } => DeviceClass::PowerSwitch,
            DeviceState::Sensor { .. } => DeviceClass::Sensor,
            DeviceState::Contact { .. } => DeviceClass::Contact,
            DeviceState::Motion { .. } => DeviceClass::Motion,
            DeviceState::Other { .. } => DeviceClass::Other,
        }
    }

    /// Human-facing status string (`ON`/`OFF`, `open`, `detected`, ...).
    /// Sensors have no single status and return `None`.
    pub fn status(&self) -> Option<&str> {
        match &self.state {
            DeviceState::LightDimmer { power, .. } | DeviceState::PowerSwitch { power } => {
                Some(power.as_str())
            }
            DeviceState::Contact { state, .. } => Some(state.as_str()),
            DeviceState::Motion { occupancy, .. } => Some(occupancy.as_str()),
            DeviceState::Other { status, .. } => Some(status),
            DeviceState::Sensor { .. } => None,
        }
    }

    /// Short summary of the reportable status, used to deduplicate answers
    /// to explicit status queries.
    pub fn status_key(&self) -> String {
        match &self.state {
            DeviceState::Sensor {
                temperature,
                humidity,
                battery,
            } => format!(
                "T={};H={};B={}",
                opt(temperature),
                opt(humidity),
                opt(battery)
            ),
            DeviceState::Contact { state, battery } => {
                format!("S={};B={}", state.as_str(), opt(battery))
            }
            DeviceState::Motion {
                occupancy,
                battery,
                voltage,
            } => format!(
                "S={};B={};V={}",
                occupancy.as_str(),
                opt(battery),
                opt(voltage)
            ),
            _ => self.status().unwrap_or_default().to_string(),
        }
    }

    /// Class-specific equality: true when `other` reports nothing new
    /// compared to `self`.
    ///
    /// Temperature and humidity compare after truncation to whole units, so
    /// 21.4 -> 21.6 is unchanged but 21.9 -> 22.1 is a change. Other optional
    /// fields compare strictly, with both-missing counted as equal. Events of
    /// different classes never compare equal.
    pub fn same_state(&self, other: &NormalizedEvent) -> bool {
        match (&self.state, &other.state) {
            (
                DeviceState::LightDimmer {
                    power: a_power,
                    brightness: a_brightness,
                    ..
                },
                DeviceState::LightDimmer {
                    power: b_power,
                    brightness: b_brightness,
                    ..
                },
            ) => a_power == b_power && a_brightness == b_brightness,
            (DeviceState::PowerSwitch { power: a }, DeviceState::PowerSwitch { power: b }) => {
                a == b
            }
            (
                DeviceState::Sensor {
                    temperature: a_temp,
                    humidity: a_hum,
                    battery: a_bat,
                },
                DeviceState::Sensor {
                    temperature: b_temp,
                    humidity: b_hum,
                    battery: b_bat,
                },
            ) => truncated_eq(*a_temp, *b_temp) && truncated_eq(*a_hum, *b_hum) && a_bat == b_bat,
            (
                DeviceState::Contact {
                    state: a_state,
                    battery: a_bat,
                },
                DeviceState::Contact {
                    state: b_state,
                    battery: b_bat,
                },
            ) => a_state == b_state && a_bat == b_bat,
            (
                DeviceState::Motion {
                    occupancy: a_occ,
                    battery: a_bat,
                    voltage: a_volt,
                },
                DeviceState::Motion {
                    occupancy: b_occ,
                    battery: b_bat,
                    voltage: b_volt,
                },
            ) => a_occ == b_occ && a_bat == b_bat && a_volt == b_volt,
            (
                DeviceState::Other {
                    status: a_status,
                    brightness: a_brightness,
                },
                DeviceState::Other {
                    status: b_status,
                    brightness: b_brightness,
                },
            ) => {
                a_status == b_status && a_brightness.unwrap_or(0) == b_brightness.unwrap_or(0)
            }
            _ => false,
        }
    }

    /// Flatten into `(name, value)` pairs for query-string delivery.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("device", self.device_key.clone()),
            ("room", self.room.clone()),
            ("type", self.device_class().as_str().to_string()),
        ];
        if let Some(status) = self.status() {
            params.push(("status", status.to_string()));
        }

        match &self.state {
            DeviceState::LightDimmer {
                brightness, color, ..
            } => {
                params.push(("brightness", brightness.to_string()));
                if let Some(color) = color {
                    params.push(("color", color.clone()));
                }
            }
            DeviceState::PowerSwitch { .. } => {}
            DeviceState::Sensor {
                temperature,
                humidity,
                battery,
            } => {
                push_opt(&mut params, "temperature", temperature);
                push_opt(&mut params, "humidity", humidity);
                push_opt(&mut params, "battery", battery);
            }
            DeviceState::Contact { battery, .. } => {
                push_opt(&mut params, "battery", battery);
            }
            DeviceState::Motion {
                battery, voltage, ..
            } => {
                push_opt(&mut params, "battery", battery);
                push_opt(&mut params, "voltage", voltage);
            }
            DeviceState::Other { brightness, .. } => {
                if let Some(brightness) = brightness {
                    params.push(("brightness", brightness.to_string()));
                }
            }
        }

        params
    }
}

fn truncated_eq(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.trunc() as i64 == b.trunc() as i64,
        (None, None) => true,
        _ => false,
    }
}

fn opt(value: &Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "none".to_string(),
    }
}

fn push_opt(params: &mut Vec<(&'static str, String)>, name: &'static str, value: &Option<f64>) {
    if let Some(v) = value {
        params.push((name, v.to_string()));
    }
}
