use crate::bridge::{Bridge, Outcome};
use crate::delivery::Dispatcher;
use crate::event::CLIENT_ANNOUNCE_TOPIC;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delay before polling again after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Broker connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Root of the coordinator's topic tree
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_base_topic() -> String {
    "zigbee2mqtt".to_string()
}

fn default_client_id() -> String {
    "zigbridge".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            base_topic: default_base_topic(),
            client_id: default_client_id(),
            keep_alive_seconds: default_keep_alive(),
        }
    }
}

/// Build client options. Credentials are only set when a username is given.
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_seconds));
    if let Some(user) = &config.username {
        options.set_credentials(user, config.password.as_deref().unwrap_or_default());
    }
    options
}

/// Consume the broker connection until the task is aborted.
///
/// Subscriptions are (re)issued on every ConnAck so a broker restart does not
/// leave the bridge deaf. Connection errors are logged and retried.
pub async fn run_listener(config: MqttConfig, bridge: Arc<Bridge>, dispatcher: Dispatcher) {
    info!(
        host = %config.host,
        port = config.port,
        base_topic = %config.base_topic,
        "Connecting to MQTT broker"
    );

    let (client, mut eventloop) = AsyncClient::new(mqtt_options(&config), 10);
    loop {
        poll_once(&client, &mut eventloop, &bridge, &dispatcher).await;
    }
}

async fn poll_once(
    client: &AsyncClient,
    eventloop: &mut EventLoop,
    bridge: &Bridge,
    dispatcher: &Dispatcher,
) {
    match eventloop.poll().await {
        Ok(Event::Incoming(Packet::ConnAck(_))) => {
            info!("Connected to MQTT broker");
            for filter in [bridge.subscription(), CLIENT_ANNOUNCE_TOPIC.to_string()] {
                // try_subscribe only queues the request; the event loop sends it
                if let Err(e) = client.try_subscribe(filter.as_str(), QoS::AtMostOnce) {
                    warn!(filter = %filter, error = %e, "Failed to subscribe");
                } else {
                    debug!(filter = %filter, "Subscribed");
                }
            }
        }
        Ok(Event::Incoming(Packet::Publish(publish))) => {
            let outcome = bridge.handle(&publish.topic, &publish.payload);
            forward(outcome, dispatcher);
        }
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "MQTT connection error, retrying");
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }
}

fn forward(outcome: Outcome, dispatcher: &Dispatcher) {
    match outcome {
        Outcome::Inventory(inventory) => dispatcher.dispatch_inventory(inventory),
        Outcome::Deliveries(deliveries) if !deliveries.is_empty() => {
            dispatcher.dispatch_deliveries(deliveries)
        }
        Outcome::QueryRegistered(device_key) => {
            debug!(device_key = %device_key, "Awaiting query response");
        }
        Outcome::Deliveries(_) | Outcome::ClientUpdated | Outcome::Ignored => {}
    }
}
