use super::CacheEntry;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Last status sent in answer to an explicit query, per device.
///
/// Uses a short TTL: an identical answer repeated within the window is
/// dropped, after it the same answer goes out again.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry<String>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// True unless the same `status_key` was sent for `device_key` within the TTL.
    pub fn should_send(&self, device_key: &str, status_key: &str) -> bool {
        self.should_send_at(device_key, status_key, Instant::now())
    }

    pub(crate) fn should_send_at(&self, device_key: &str, status_key: &str, now: Instant) -> bool {
        let Some(entry) = self.entries.get(device_key) else {
            return true;
        };

        if entry.is_expired(now, self.ttl) {
            drop(entry);
            self.entries
                .remove_if(device_key, |_, e| e.is_expired(now, self.ttl));
            return true;
        }

        if entry.payload == status_key {
            debug!(device_key = %device_key, status = %status_key, "Duplicate query response");
            return false;
        }
        true
    }

    pub fn record(&self, device_key: &str, status_key: &str) {
        self.record_at(device_key, status_key, Instant::now());
    }

    pub(crate) fn record_at(&self, device_key: &str, status_key: &str, now: Instant) {
        self.entries.insert(
            device_key.to_string(),
            CacheEntry::new(status_key.to_string(), now),
        );
    }

    /// Remove entries past the TTL. Returns how many were removed.
    pub fn expire(&self) -> usize {
        self.expire_at(Instant::now())
    }

    pub(crate) fn expire_at(&self, now: Instant) -> usize {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_when_absent() {
        let cache = ResponseCache::new(Duration::from_secs(5));
        assert!(cache.should_send("lamp1", "ON"));
    }

    #[test]
    fn test_duplicate_within_ttl_is_dropped() {
        let cache = ResponseCache::new(Duration::from_secs(5));
        cache.record("lamp1", "ON");

        assert!(!cache.should_send("lamp1", "ON"));
        assert!(cache.should_send("lamp1", "OFF"));
        // Other devices are unaffected
        assert!(cache.should_send("lamp2", "ON"));
    }

    #[test]
    fn test_duplicate_after_ttl_is_sent() {
        let ttl = Duration::from_secs(5);
        let cache = ResponseCache::new(ttl);
        let t0 = Instant::now();
        cache.record_at("lamp1", "ON", t0);

        assert!(!cache.should_send_at("lamp1", "ON", t0 + Duration::from_secs(1)));
        assert!(cache.should_send_at("lamp1", "ON", t0 + ttl + Duration::from_millis(1)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expire_removes_stale_entries() {
        let ttl = Duration::from_secs(5);
        let cache = ResponseCache::new(ttl);
        let t0 = Instant::now();
        cache.record_at("lamp1", "ON", t0);
        cache.record_at("lamp2", "OFF", t0 + Duration::from_secs(4));

        assert_eq!(cache.expire_at(t0 + Duration::from_secs(6)), 1);
        assert_eq!(cache.len(), 1);
    }
}
