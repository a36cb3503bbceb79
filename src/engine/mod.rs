// Deduplication and query-correlation engine

mod change_cache;
mod config;
mod decision;
mod janitor;
mod pending;
mod response_cache;
mod stats;

pub use change_cache::ChangeCache;
pub use config::EngineConfig;
pub use decision::{DecisionEngine, Delivery, EngineError, SweepReport, Verdict};
pub use janitor::run_janitor;
pub use pending::PendingQueries;
pub use response_cache::ResponseCache;
pub use stats::{DecisionCounters, EngineStats, StatsSnapshot};

use std::time::{Duration, Instant};

/// Timestamped value held by the engine's caches. Writes replace, never merge.
pub(crate) struct CacheEntry<T> {
    pub(crate) captured_at: Instant,
    pub(crate) payload: T,
}

impl<T> CacheEntry<T> {
    pub(crate) fn new(payload: T, captured_at: Instant) -> Self {
        Self {
            captured_at,
            payload,
        }
    }

    pub(crate) fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.captured_at) > ttl
    }
}
