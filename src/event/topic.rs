//! Topic classification for the bridge's MQTT subscriptions.
//!
//! Device topics have the shape `<base>/<zone>/<room>/<device>[/<endpoint>]`,
//! optionally followed by `/get` (status query) or `/set` (command).

/// Topic on which listeners announce themselves as `name/ip`.
pub const CLIENT_ANNOUNCE_TOPIC: &str = "client/con_ip";

/// Alternate device-list topic published by a secondary coordinator.
const USB_DEVICE_LIST_TOPIC: &str = "usb/bridge/devices";

const QUERY_SUFFIX: &str = "get";
const COMMAND_SUFFIX: &str = "set";

/// What a topic means to the bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Topic {
    /// Bridge-wide device list.
    DeviceList,
    /// Any other `<base>/bridge/...` topic (info, logging, health).
    Bridge,
    /// Listener address announcement.
    ClientAnnounce,
    /// Explicit status query for one device.
    Query { device_key: String },
    /// Command sent to a device; never forwarded.
    Command,
    /// State published by a device.
    DeviceState {
        room: String,
        device: String,
        endpoint: Option<String>,
    },
    /// Topic outside the bridge's base, or too short to route.
    Unroutable,
}

impl Topic {
    pub fn classify(base: &str, topic: &str) -> Topic {
        if topic == USB_DEVICE_LIST_TOPIC || topic == format!("{}/bridge/devices", base) {
            return Topic::DeviceList;
        }
        if topic == CLIENT_ANNOUNCE_TOPIC {
            return Topic::ClientAnnounce;
        }

        let parts: Vec<&str> = topic.split('/').collect();
        if parts.first() != Some(&base) {
            return Topic::Unroutable;
        }
        if parts.get(1) == Some(&"bridge") {
            return Topic::Bridge;
        }

        match parts.last() {
            Some(&COMMAND_SUFFIX) => return Topic::Command,
            Some(&QUERY_SUFFIX) => {
                return match query_key(&parts) {
                    Some(device_key) => Topic::Query { device_key },
                    None => Topic::Unroutable,
                };
            }
            _ => {}
        }

        if parts.len() < 4 || parts[2].is_empty() || parts[3].is_empty() {
            return Topic::Unroutable;
        }

        // Only a channel may follow the device; `availability` and similar
        // sub-topics are not device state.
        let endpoint = match &parts[4..] {
            [] => None,
            [ep] if is_endpoint(ep) => Some(ep.to_string()),
            _ => return Topic::Unroutable,
        };

        Topic::DeviceState {
            room: parts[2].to_string(),
            device: parts[3].to_string(),
            endpoint,
        }
    }
}

/// Dual-channel devices expose their channels as `l1` / `l2`.
pub(crate) fn is_endpoint(segment: &str) -> bool {
    matches!(segment, "l1" | "l2")
}

/// Device key a `/get` topic refers to: `device`, or `device/l1` when the
/// query targets one channel.
fn query_key(parts: &[&str]) -> Option<String> {
    // base/zone/room/device/get at minimum
    if parts.len() < 5 || parts[3].is_empty() || parts[3] == QUERY_SUFFIX {
        return None;
    }
    match parts.get(4) {
        Some(ep) if is_endpoint(ep) => Some(format!("{}/{}", parts[3], ep)),
        _ => Some(parts[3].to_string()),
    }
}

#[cfg(test)]
mod topic_tests {
    use super::*;

    #[test]
    fn test_device_list_topics() {
        assert_eq!(Topic::classify("home", "home/bridge/devices"), Topic::DeviceList);
        assert_eq!(Topic::classify("home", "usb/bridge/devices"), Topic::DeviceList);
        assert_eq!(Topic::classify("home", "home/bridge/info"), Topic::Bridge);
    }

    #[test]
    fn test_client_announce() {
        assert_eq!(Topic::classify("home", "client/con_ip"), Topic::ClientAnnounce);
    }

    #[test]
    fn test_query_topics() {
        assert_eq!(
            Topic::classify("home", "home/first/kitchen/lamp1/get"),
            Topic::Query {
                device_key: "lamp1".to_string()
            }
        );
        assert_eq!(
            Topic::classify("home", "home/first/kitchen/switch1/l2/get"),
            Topic::Query {
                device_key: "switch1/l2".to_string()
            }
        );
        assert_eq!(Topic::classify("home", "home/first/kitchen/get"), Topic::Unroutable);
    }

    #[test]
    fn test_command_topic_is_not_forwarded() {
        assert_eq!(Topic::classify("home", "home/first/kitchen/lamp1/set"), Topic::Command);
    }

    #[test]
    fn test_device_state_topics() {
        assert_eq!(
            Topic::classify("home", "home/first/kitchen/lamp1"),
            Topic::DeviceState {
                room: "kitchen".to_string(),
                device: "lamp1".to_string(),
                endpoint: None,
            }
        );
        assert_eq!(
            Topic::classify("home", "home/first/kitchen/dimmer/l1"),
            Topic::DeviceState {
                room: "kitchen".to_string(),
                device: "dimmer".to_string(),
                endpoint: Some("l1".to_string()),
            }
        );
    }

    #[test]
    fn test_foreign_and_short_topics() {
        assert_eq!(Topic::classify("home", "other/first/kitchen/lamp1"), Topic::Unroutable);
        assert_eq!(Topic::classify("home", "home/first/kitchen"), Topic::Unroutable);
    }

    #[test]
    fn test_non_channel_subtopics_are_unroutable() {
        assert_eq!(
            Topic::classify("home", "home/first/kitchen/lamp1/availability"),
            Topic::Unroutable
        );
        assert_eq!(
            Topic::classify("home", "home/first/kitchen/switch1/l1/extra"),
            Topic::Unroutable
        );
    }
}
