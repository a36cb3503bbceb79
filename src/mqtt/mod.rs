// MQTT transport

mod client;

pub use client::{mqtt_options, run_listener, MqttConfig};
