use super::change_cache::ChangeCache;
use super::config::EngineConfig;
use super::pending::PendingQueries;
use super::response_cache::ResponseCache;
use super::stats::{EngineStats, StatsSnapshot};
use crate::event::NormalizedEvent;
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

/// Routing outcome for one normalized event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Duplicate of recently observed or recently answered state.
    Suppressed,
    /// Unsolicited state change worth forwarding.
    Notify,
    /// Answer to an explicit status query.
    QueryFulfilled,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Suppressed => "suppressed",
            Verdict::Notify => "notify",
            Verdict::QueryFulfilled => "query",
        }
    }

    pub fn is_delivered(&self) -> bool {
        !matches!(self, Verdict::Suppressed)
    }
}

/// A forwarded event, handed to the outbound transport
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Delivery {
    pub event: NormalizedEvent,
    pub verdict: Verdict,
}

impl Delivery {
    /// Event fields plus the routing reason, flattened for query strings.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = self.event.to_params();
        params.push(("reason", self.verdict.as_str().to_string()));
        params
    }
}

/// Events the engine refuses to evaluate
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    MissingDeviceKey,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MissingDeviceKey => write!(f, "event has no device key"),
        }
    }
}

impl std::error::Error for EngineError {}

/// What one janitor pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub pending_expired: usize,
    pub responses_expired: usize,
    pub changes_expired: usize,
}

/// Decides, per event, whether it is a duplicate, an unsolicited change, or
/// the answer to a pending status query.
///
/// Owns the change cache, the query response cache and the pending query
/// set; nothing else mutates them.
pub struct DecisionEngine {
    changes: ChangeCache,
    responses: ResponseCache,
    pending: PendingQueries,
    config: EngineConfig,
    stats: EngineStats,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            changes: ChangeCache::new(config.change_ttl()),
            responses: ResponseCache::new(config.response_ttl()),
            pending: PendingQueries::new(),
            config,
            stats: EngineStats::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn change_cache(&self) -> &ChangeCache {
        &self.changes
    }

    pub fn response_cache(&self) -> &ResponseCache {
        &self.responses
    }

    pub fn pending_queries(&self) -> &PendingQueries {
        &self.pending
    }

    /// Note an explicit status query. Nothing is forwarded until the device
    /// answers.
    pub fn register_query(&self, device_key: &str) -> Result<(), EngineError> {
        self.register_query_at(device_key, Instant::now())
    }

    pub(crate) fn register_query_at(&self, device_key: &str, now: Instant) -> Result<(), EngineError> {
        if device_key.is_empty() {
            return Err(EngineError::MissingDeviceKey);
        }
        self.pending.register_at(device_key, now);
        self.stats.record_query();
        debug!(device_key = %device_key, "Status query registered");
        Ok(())
    }

    /// Route a single event.
    pub fn decide(&self, event: &NormalizedEvent) -> Result<Verdict, EngineError> {
        let query = self.correlate(&event.device_key);
        self.decide_at(event, query.as_deref(), Instant::now())
    }

    /// Route every element of one bus message independently.
    ///
    /// Query correlation is resolved for all elements before any of them is
    /// processed, so every channel of a dual device answers the same pending
    /// query. Elements that fail are logged and skipped.
    pub fn process_batch(&self, events: &[NormalizedEvent]) -> Vec<Delivery> {
        let now = Instant::now();
        let queries: Vec<Option<String>> = events
            .iter()
            .map(|event| self.correlate(&event.device_key))
            .collect();

        events
            .iter()
            .zip(queries)
            .filter_map(|(event, query)| match self.decide_at(event, query.as_deref(), now) {
                Ok(verdict) if verdict.is_delivered() => Some(Delivery {
                    event: event.clone(),
                    verdict,
                }),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, room = %event.room, "Dropping event");
                    None
                }
            })
            .collect()
    }

    /// Pending query answered by `device_key`: the key itself, or the base
    /// device when the key names one channel (`switch1/l1` answers a query
    /// on `switch1`).
    fn correlate(&self, device_key: &str) -> Option<String> {
        if self.pending.is_pending(device_key) {
            return Some(device_key.to_string());
        }
        let (base, _) = device_key.split_once('/')?;
        self.pending.is_pending(base).then(|| base.to_string())
    }

    pub(crate) fn decide_at(
        &self,
        event: &NormalizedEvent,
        query: Option<&str>,
        now: Instant,
    ) -> Result<Verdict, EngineError> {
        let key = event.device_key.as_str();
        if key.is_empty() {
            self.stats.record_rejected();
            return Err(EngineError::MissingDeviceKey);
        }

        let verdict = match query {
            Some(query_key) => {
                let status_key = event.status_key();
                let verdict = if self.responses.should_send_at(key, &status_key, now) {
                    self.responses.record_at(key, &status_key, now);
                    // Keep the change cache in step so an unsolicited repeat
                    // of the answered state is suppressed.
                    self.changes.record_at(key, event, now);
                    Verdict::QueryFulfilled
                } else {
                    Verdict::Suppressed
                };
                // Answered whether or not the duplicate goes out
                self.pending.fulfill(query_key);
                verdict
            }
            None => {
                if self.changes.should_suppress_at(key, event, now) {
                    Verdict::Suppressed
                } else {
                    self.changes.record_at(key, event, now);
                    Verdict::Notify
                }
            }
        };

        self.stats.record_verdict(verdict);
        debug!(
            device_key = %key,
            class = %event.device_class(),
            verdict = verdict.as_str(),
            "Event routed"
        );
        Ok(verdict)
    }

    /// Expire pending queries and query responses; the change cache too when
    /// configured. Lookups expire change-cache entries lazily regardless.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> SweepReport {
        SweepReport {
            pending_expired: self.pending.expire_at(self.config.pending_max_age(), now),
            responses_expired: self.responses.expire_at(now),
            changes_expired: if self.config.sweep_change_cache {
                self.changes.sweep_at(now)
            } else {
                0
            },
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            counters: self.stats.counters(),
            change_cache_entries: self.changes.len(),
            response_cache_entries: self.responses.len(),
            pending_queries: self.pending.len(),
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
