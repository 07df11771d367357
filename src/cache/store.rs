use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned, de::IgnoredAny};

use super::CacheEntry;
use crate::storage::KeyValueStore;

pub const CACHE_PREFIX: &str = "ai_cache_";
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh: usize,
}

/// Time-bounded response cache over a [`KeyValueStore`].
///
/// Storage failures never escape: reads degrade to a miss and writes are
/// skipped, both with a warning.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn storage_key(key: &str) -> String {
        format!("{CACHE_PREFIX}{key}")
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now().timestamp_millis()).await
    }

    /// Expired entries read as a miss but stay in storage until overwritten.
    pub async fn get_at<T: DeserializeOwned>(&self, key: &str, now_ms: i64) -> Option<T> {
        let raw = match self.store.get(&Self::storage_key(key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };
        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache entry undecodable, treating as miss");
                return None;
            }
        };
        if !entry.is_fresh(now_ms, self.ttl_ms()) {
            tracing::debug!(key = %key, "cache entry expired");
            return None;
        }
        Some(entry.data)
    }

    pub async fn set<T: Serialize>(&self, key: &str, data: &T) {
        self.set_at(key, data, Utc::now().timestamp_millis()).await
    }

    pub async fn set_at<T: Serialize>(&self, key: &str, data: &T, now_ms: i64) {
        let entry = CacheEntry::new(key, data, now_ms);
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache entry not serializable, skipping");
                return;
            }
        };
        if let Err(err) = self.store.set(&Self::storage_key(key), &raw).await {
            tracing::warn!(key = %key, error = %err, "cache write failed, skipping");
        }
    }

    /// Removes every cache entry, returning how many were removed.
    pub async fn clear(&self) -> usize {
        let keys = match self.store.all_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(error = %err, "cache clear failed to list keys");
                return 0;
            }
        };
        let mut removed = 0;
        for key in keys.iter().filter(|key| key.starts_with(CACHE_PREFIX)) {
            match self.store.remove(key).await {
                Ok(()) => removed += 1,
                Err(err) => tracing::warn!(key = %key, error = %err, "cache entry removal failed"),
            }
        }
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let now_ms = Utc::now().timestamp_millis();
        let keys = match self.store.all_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(error = %err, "cache stats failed to list keys");
                return CacheStats::default();
            }
        };
        let mut stats = CacheStats::default();
        for key in keys.iter().filter(|key| key.starts_with(CACHE_PREFIX)) {
            stats.entries += 1;
            let Ok(Some(raw)) = self.store.get(key).await else {
                continue;
            };
            if let Ok(entry) = serde_json::from_str::<CacheEntry<IgnoredAny>>(&raw) {
                if entry.is_fresh(now_ms, self.ttl_ms()) {
                    stats.fresh += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    const HOUR_MS: i64 = 60 * 60 * 1_000;

    fn cache_over(storage: Arc<MemoryStorage>) -> ResponseCache {
        ResponseCache::new(storage, DEFAULT_TTL)
    }

    #[tokio::test]
    async fn hit_within_window() {
        let cache = cache_over(Arc::new(MemoryStorage::new()));
        cache.set_at("k", &vec!["tomato".to_string()], 0).await;
        let hit: Option<Vec<String>> = cache.get_at("k", 23 * HOUR_MS).await;
        assert_eq!(hit, Some(vec!["tomato".to_string()]));
    }

    #[tokio::test]
    async fn miss_after_expiry_but_entry_kept() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = cache_over(storage.clone());
        cache.set_at("k", &42u32, 0).await;

        let miss: Option<u32> = cache.get_at("k", 24 * HOUR_MS + 1).await;
        assert_eq!(miss, None);
        assert!(storage.get("ai_cache_k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn later_write_supersedes() {
        let cache = cache_over(Arc::new(MemoryStorage::new()));
        cache.set_at("k", &1u32, 0).await;
        cache.set_at("k", &2u32, 10).await;
        assert_eq!(cache.get_at::<u32>("k", 20).await, Some(2));
    }

    #[tokio::test]
    async fn storage_failures_degrade_to_miss() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = cache_over(storage.clone());
        storage.set_failing(true);

        cache.set("k", &1u32).await;
        assert_eq!(cache.get::<u32>("k").await, None);
        assert_eq!(cache.clear().await, 0);
    }

    #[tokio::test]
    async fn wrong_shape_is_a_miss() {
        let cache = cache_over(Arc::new(MemoryStorage::new()));
        cache.set("k", &"not a number").await;
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn clear_only_touches_cache_keys() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = cache_over(storage.clone());
        storage.set("saved_recipes", "[]").await.unwrap();
        cache.set("a", &1u32).await;
        cache.set("b", &2u32).await;

        assert_eq!(cache.stats().await, CacheStats { entries: 2, fresh: 2 });
        assert_eq!(cache.clear().await, 2);
        assert_eq!(cache.stats().await, CacheStats::default());
        assert!(storage.get("saved_recipes").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stats_count_expired_entries() {
        let cache = cache_over(Arc::new(MemoryStorage::new()));
        cache.set_at("old", &1u32, 0).await;
        cache.set("new", &2u32).await;
        assert_eq!(cache.stats().await, CacheStats { entries: 2, fresh: 1 });
    }
}
