use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Verdict;

/// Lifetime decision counters for the engine
#[derive(Default)]
pub struct EngineStats {
    notified: AtomicU64,
    query_fulfilled: AtomicU64,
    suppressed: AtomicU64,
    rejected: AtomicU64,
    queries_registered: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_verdict(&self, verdict: Verdict) {
        let counter = match verdict {
            Verdict::Notify => &self.notified,
            Verdict::QueryFulfilled => &self.query_fulfilled,
            Verdict::Suppressed => &self.suppressed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self) {
        self.queries_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counters(&self) -> DecisionCounters {
        DecisionCounters {
            notified: self.notified.load(Ordering::Relaxed),
            query_fulfilled: self.query_fulfilled.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            queries_registered: self.queries_registered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecisionCounters {
    pub notified: u64,
    pub query_fulfilled: u64,
    pub suppressed: u64,
    pub rejected: u64,
    pub queries_registered: u64,
}

/// Point-in-time view of counters and store sizes
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub counters: DecisionCounters,
    pub change_cache_entries: usize,
    pub response_cache_entries: usize,
    pub pending_queries: usize,
}
