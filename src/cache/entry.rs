use serde::{Deserialize, Serialize};

/// A cached pipeline result as persisted in the key-value store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub data: T,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, data: T, timestamp: i64) -> Self {
        Self {
            key: key.into(),
            data,
            timestamp,
        }
    }

    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms.saturating_sub(self.timestamp) < ttl_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_window_is_exclusive() {
        let entry = CacheEntry::new("k", (), 1_000);
        assert!(entry.is_fresh(1_000, 500));
        assert!(entry.is_fresh(1_499, 500));
        assert!(!entry.is_fresh(1_500, 500));
    }

    #[test]
    fn corrupt_timestamps_do_not_overflow() {
        let ancient = CacheEntry::new("k", (), i64::MIN);
        assert!(!ancient.is_fresh(1_000, 500));
        let future = CacheEntry::new("k", (), i64::MAX);
        assert!(future.is_fresh(i64::MIN, 500));
    }
}
