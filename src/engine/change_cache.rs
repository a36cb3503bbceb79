use super::CacheEntry;
use crate::event::NormalizedEvent;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Last reported state per device, used to drop unsolicited duplicates.
///
/// Expiry is checked lazily on lookup: an entry older than the TTL is removed
/// and treated as absent, so the next observation is always reported.
pub struct ChangeCache {
    entries: DashMap<String, CacheEntry<NormalizedEvent>>,
    ttl: Duration,
}

impl ChangeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// True when `event` reports nothing new compared to the cached state.
    pub fn should_suppress(&self, device_key: &str, event: &NormalizedEvent) -> bool {
        self.should_suppress_at(device_key, event, Instant::now())
    }

    pub(crate) fn should_suppress_at(
        &self,
        device_key: &str,
        event: &NormalizedEvent,
        now: Instant,
    ) -> bool {
        let Some(entry) = self.entries.get(device_key) else {
            return false;
        };

        if entry.is_expired(now, self.ttl) {
            // Release the shard read lock before removing
            drop(entry);
            self.entries
                .remove_if(device_key, |_, e| e.is_expired(now, self.ttl));
            debug!(device_key = %device_key, "Change cache entry expired");
            return false;
        }

        entry.payload.same_state(event)
    }

    /// Replace the cached state for `device_key`.
    pub fn record(&self, device_key: &str, event: &NormalizedEvent) {
        self.record_at(device_key, event, Instant::now());
    }

    pub(crate) fn record_at(&self, device_key: &str, event: &NormalizedEvent, now: Instant) {
        self.entries
            .insert(device_key.to_string(), CacheEntry::new(event.clone(), now));
    }

    /// Cached state for `device_key`, expired or not.
    pub fn get(&self, device_key: &str) -> Option<NormalizedEvent> {
        self.entries.get(device_key).map(|e| e.payload.clone())
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now, self.ttl);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
