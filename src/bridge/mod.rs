use crate::clients::ClientRegistry;
use crate::engine::{DecisionEngine, Delivery};
use crate::event::{normalize, Topic};
use crate::inventory::{build_inventory, DeviceDirectory, DeviceInventory};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};


/// What handling one bus message produced
#[derive(Debug)]
pub enum Outcome {
    /// A new device inventory to forward to listeners.
    Inventory(DeviceInventory),
    /// Device events that survived deduplication (possibly none).
    Deliveries(Vec<Delivery>),
    /// A status query was noted; the answer comes with a later message.
    QueryRegistered(String),
    /// A listener announcement was applied.
    ClientUpdated,
    Ignored,
}

/// Routes raw bus messages through normalization, the decision engine, the
/// device directory and the listener registry.
pub struct Bridge {
    base_topic: String,
    engine: Arc<DecisionEngine>,
    directory: Arc<DeviceDirectory>,
    clients: Arc<ClientRegistry>,
}

impl Bridge {
    pub fn new(
        base_topic: impl Into<String>,
        engine: Arc<DecisionEngine>,
        directory: Arc<DeviceDirectory>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            base_topic: base_topic.into(),
            engine,
            directory,
            clients,
        }
    }

    /// Subscription filter covering every topic under the base.
    pub fn subscription(&self) -> String {
        format!("{}/#", self.base_topic)
    }

    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    /// Handle one message. Never fails: problems are logged and the message
    /// is ignored.
    pub fn handle(&self, topic: &str, payload: &[u8]) -> Outcome {
        let Ok(text) = std::str::from_utf8(payload) else {
            debug!(topic = %topic, "Ignoring non UTF-8 payload");
            return Outcome::Ignored;
        };

        let route = Topic::classify(&self.base_topic, topic);
        match route {
            Topic::ClientAnnounce => match self.clients.announce(text) {
                Ok(true) => Outcome::ClientUpdated,
                Ok(false) => Outcome::Ignored,
                Err(e) => {
                    warn!(payload = %text, error = %e, "Rejected listener announcement");
                    Outcome::Ignored
                }
            },
            Topic::Query { device_key } => match self.engine.register_query(&device_key) {
                Ok(()) => Outcome::QueryRegistered(device_key),
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Rejected status query");
                    Outcome::Ignored
                }
            },
            Topic::DeviceList => {
                let Some(json) = parse_json(topic, text) else {
                    return Outcome::Ignored;
                };
                match build_inventory(&json) {
                    Some(inventory) => {
                        info!(devices = inventory.total_devices, "Device inventory updated");
                        self.directory.update(&inventory);
                        Outcome::Inventory(inventory)
                    }
                    None => {
                        warn!(topic = %topic, "Device list payload is not a list");
                        Outcome::Ignored
                    }
                }
            }
            Topic::DeviceState { .. } => {
                let Some(json) = parse_json(topic, text) else {
                    return Outcome::Ignored;
                };
                match normalize(&route, &json) {
                    Ok(events) if events.is_empty() => Outcome::Ignored,
                    Ok(events) => Outcome::Deliveries(self.engine.process_batch(&events)),
                    Err(e) => {
                        warn!(topic = %topic, error = %e, "Dropping malformed device payload");
                        Outcome::Ignored
                    }
                }
            }
            Topic::Bridge | Topic::Command | Topic::Unroutable => Outcome::Ignored,
        }
    }
}

/// Empty payloads count as an empty object.
fn parse_json(topic: &str, text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return Some(Value::Object(Default::default()));
    }
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(topic = %topic, error = %e, "Payload is not valid JSON");
            None
        }
    }
}
