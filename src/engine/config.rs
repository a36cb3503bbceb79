use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing configuration for the decision engine and its janitor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long an unsolicited state stays authoritative for duplicate
    /// suppression (seconds)
    #[serde(default = "default_change_ttl")]
    pub change_ttl_seconds: u64,

    /// Window in which identical answers to a status query are dropped (seconds)
    #[serde(default = "default_response_ttl")]
    pub response_ttl_seconds: u64,

    /// Age after which an unanswered status query is forgotten (seconds)
    #[serde(default = "default_pending_max_age")]
    pub pending_max_age_seconds: u64,

    /// Interval between janitor sweeps (seconds)
    #[serde(default = "default_janitor_interval")]
    pub janitor_interval_seconds: u64,

    /// Also sweep the change cache on each janitor run. Lookups expire stale
    /// entries either way.
    #[serde(default)]
    pub sweep_change_cache: bool,
}

fn default_change_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_response_ttl() -> u64 {
    5
}

fn default_pending_max_age() -> u64 {
    30
}

fn default_janitor_interval() -> u64 {
    300
}

impl EngineConfig {
    pub fn change_ttl(&self) -> Duration {
        Duration::from_secs(self.change_ttl_seconds)
    }

    pub fn response_ttl(&self) -> Duration {
        Duration::from_secs(self.response_ttl_seconds)
    }

    pub fn pending_max_age(&self) -> Duration {
        Duration::from_secs(self.pending_max_age_seconds)
    }

    /// Never zero: tokio intervals panic on a zero period.
    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_seconds.max(1))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            change_ttl_seconds: default_change_ttl(),
            response_ttl_seconds: default_response_ttl(),
            pending_max_age_seconds: default_pending_max_age(),
            janitor_interval_seconds: default_janitor_interval(),
            sweep_change_cache: false,
        }
    }
}
