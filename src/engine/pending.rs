use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Outstanding explicit status queries, one per device key.
///
/// A query stays pending until a state message for the device answers it or
/// the janitor expires it.
pub struct PendingQueries {
    requested: DashMap<String, Instant>,
}

impl PendingQueries {
    pub fn new() -> Self {
        Self {
            requested: DashMap::new(),
        }
    }

    /// Record a query, refreshing the timestamp of one already pending.
    pub fn register(&self, device_key: &str) {
        self.register_at(device_key, Instant::now());
    }

    pub(crate) fn register_at(&self, device_key: &str, now: Instant) {
        self.requested.insert(device_key.to_string(), now);
    }

    /// Pure lookup; never expires anything.
    pub fn is_pending(&self, device_key: &str) -> bool {
        self.requested.contains_key(device_key)
    }

    /// Drop the query for `device_key`. No-op when none is pending.
    pub fn fulfill(&self, device_key: &str) {
        self.requested.remove(device_key);
    }

    /// Forget queries older than `max_age`. Returns how many were removed.
    pub fn expire(&self, max_age: Duration) -> usize {
        self.expire_at(max_age, Instant::now())
    }

    pub(crate) fn expire_at(&self, max_age: Duration, now: Instant) -> usize {
        let mut removed = 0;
        self.requested.retain(|_, requested_at| {
            let keep = now.saturating_duration_since(*requested_at) <= max_age;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.requested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }
}

impl Default for PendingQueries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_fulfill() {
        let pending = PendingQueries::new();
        pending.register("lamp1");
        assert!(pending.is_pending("lamp1"));

        pending.fulfill("lamp1");
        assert!(!pending.is_pending("lamp1"));

        // Idempotent
        pending.fulfill("lamp1");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_second_register_refreshes_timestamp() {
        let max_age = Duration::from_secs(30);
        let pending = PendingQueries::new();
        let t0 = Instant::now();
        pending.register_at("lamp1", t0);
        pending.register_at("lamp1", t0 + Duration::from_secs(20));

        assert_eq!(pending.len(), 1);
        assert_eq!(pending.expire_at(max_age, t0 + Duration::from_secs(40)), 0);
        assert!(pending.is_pending("lamp1"));
    }

    #[test]
    fn test_expire_removes_old_queries() {
        let max_age = Duration::from_secs(30);
        let pending = PendingQueries::new();
        let t0 = Instant::now();
        pending.register_at("old", t0);
        pending.register_at("new", t0 + Duration::from_secs(25));

        assert_eq!(pending.expire_at(max_age, t0 + Duration::from_secs(31)), 1);
        assert!(!pending.is_pending("old"));
        assert!(pending.is_pending("new"));
    }
}
