use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

// Re-export per-component config types
pub use crate::api::ApiConfig;
pub use crate::clients::ClientsConfig;
pub use crate::delivery::HttpConfig;
pub use crate::engine::EngineConfig;
pub use crate::mqtt::MqttConfig;

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub clients: ClientsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl BridgeConfig {
    /// Overlay environment variables on top of file/default values.
    pub fn apply_env(&mut self) {
        override_string("MQTT_HOST", &mut self.mqtt.host);
        override_parsed("MQTT_PORT", &mut self.mqtt.port);
        if let Ok(v) = std::env::var("MQTT_USER") {
            self.mqtt.username = Some(v);
        }
        if let Ok(v) = std::env::var("MQTT_PASSWORD") {
            self.mqtt.password = Some(v);
        }
        override_string("MQTT_TOPIC", &mut self.mqtt.base_topic);

        override_parsed("HTTP_DEVICE_PORT", &mut self.http.device_port);
        override_parsed("HTTP_DATA_PORT", &mut self.http.inventory_port);

        override_parsed("CHANGE_CACHE_TTL", &mut self.engine.change_ttl_seconds);
        override_parsed("RESPONSE_CACHE_TTL", &mut self.engine.response_ttl_seconds);
        override_parsed("PENDING_QUERY_MAX_AGE", &mut self.engine.pending_max_age_seconds);
        override_parsed("JANITOR_INTERVAL", &mut self.engine.janitor_interval_seconds);

        if let Ok(v) = std::env::var("CLIENTS_DATA_FILE") {
            self.clients.data_file = v.into();
        }
        override_parsed("API_PORT", &mut self.api.port);
    }
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(v) = std::env::var(var) {
        if !v.is_empty() {
            *target = v;
        }
    }
}

fn override_parsed<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var) {
        match v.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(var = %var, value = %v, "Ignoring unparsable environment override"),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<BridgeConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path))?;
    let config: BridgeConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}

/// Load from `ZIGBRIDGE_CONFIG` when set (defaults otherwise), then apply
/// environment overrides.
pub fn load_from_env() -> Result<BridgeConfig> {
    let mut config = match std::env::var("ZIGBRIDGE_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => BridgeConfig::default(),
    };
    config.apply_env();
    Ok(config)
}
