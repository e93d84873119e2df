//! Bastion Cache: a shared key/value store with per-entry TTL and
//! prefix invalidation.
//!
//! Values are stored as JSON so a single store can hold decisions of
//! different shapes (`bool`, `Option<bool>`, ...). The store owns an
//! ordered index of the keys it has written; [`CacheStore::remove_by_prefix`]
//! range-scans that index, so it only touches matching keys.
//!
//! Entries that expire on their own stay in the index until the next
//! prefix flush, `remove`, or `clear` touches them. Invalidating an
//! already expired key is a no-op, so a stale index entry costs nothing
//! but memory bounded by the key space.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Cache-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to encode cache value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode cache value for {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration for the cache store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries held before size-based eviction.
    pub max_capacity: u64,
    /// TTL used by [`CacheStore::set_default`] (default: 3600 = 1 hour).
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
            default_ttl_secs: 3600,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: serde_json::Value,
    ttl: Duration,
}

/// Expires every entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Arc<CacheEntry>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Arc<CacheEntry>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<CacheEntry>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Shared cache with TTL and prefix invalidation. Cheap to clone; clones
/// share entries and key index.
#[derive(Clone)]
pub struct CacheStore {
    entries: Cache<String, Arc<CacheEntry>>,
    index: Arc<Mutex<BTreeSet<String>>>,
    default_ttl: Duration,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            entries,
            index: Arc::new(Mutex::new(BTreeSet::new())),
            default_ttl: Duration::from_secs(config.default_ttl_secs),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn index(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a live entry, if any.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(entry) = self.entries.get(key).await else {
            trace!(key, "cache miss");
            return Ok(None);
        };
        trace!(key, "cache hit");
        serde_json::from_value(entry.value.clone())
            .map(Some)
            .map_err(|source| CacheError::Decode {
                key: key.to_string(),
                source,
            })
    }

    /// Write `value` under `key`, expiring after `ttl`.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.index().insert(key.to_string());
        self.entries
            .insert(key.to_string(), Arc::new(CacheEntry { value, ttl }))
            .await;
        Ok(())
    }

    /// Write `value` with the configured default TTL.
    pub async fn set_default<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.set(key, value, self.default_ttl).await
    }

    /// Return the cached value for `key`, or run `factory`, cache its
    /// result for `ttl`, and return it.
    ///
    /// Concurrent misses on the same key may both run the factory; the
    /// last write wins.
    pub async fn get_or_create<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        factory: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await? {
            return Ok(cached);
        }
        let value = factory().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }

    pub async fn remove(&self, key: &str) {
        self.index().remove(key);
        self.entries.invalidate(key).await;
    }

    /// Remove every entry whose key starts with `prefix`; returns the
    /// number of tracked keys dropped.
    pub async fn remove_by_prefix(&self, prefix: &str) -> usize {
        let matching: Vec<String> = {
            let mut index = self.index();
            let keys: Vec<String> = index
                .range(prefix.to_string()..)
                .take_while(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            for key in &keys {
                index.remove(key);
            }
            keys
        };

        for key in &matching {
            self.entries.invalidate(key).await;
        }

        debug!(prefix, removed = matching.len(), "cache prefix invalidated");
        matching.len()
    }

    pub fn clear(&self) {
        self.index().clear();
        self.entries.invalidate_all();
        debug!("cache cleared");
    }

    /// Whether a live entry exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> CacheStore {
        CacheStore::new(&CacheConfig::default())
    }

    #[tokio::test]
    async fn set_then_get() {
        let cache = store();
        cache
            .set("permissions.allowed-a-Articles", &true, Duration::from_secs(60))
            .await
            .unwrap();
        let hit: Option<bool> = cache.get("permissions.allowed-a-Articles").await.unwrap();
        assert_eq!(hit, Some(true));
        let miss: Option<bool> = cache.get("permissions.allowed-b-Articles").await.unwrap();
        assert_eq!(miss, None);
    }

    #[tokio::test]
    async fn get_or_create_runs_factory_once() {
        let cache = store();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: bool = cache
                .get_or_create("k", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(true)
                })
                .await
                .unwrap();
            assert!(value);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug)]
    struct StoreDown;

    impl From<CacheError> for StoreDown {
        fn from(_: CacheError) -> Self {
            StoreDown
        }
    }

    #[tokio::test]
    async fn factory_error_is_not_cached() {
        let cache = store();
        let result: Result<bool, StoreDown> = cache
            .get_or_create("k", Duration::from_secs(60), || async { Err(StoreDown) })
            .await;
        assert!(result.is_err());
        assert!(!cache.contains_key("k"));
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = store();
        cache.set("short", &1u32, Duration::from_millis(50)).await.unwrap();
        cache.set("long", &2u32, Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(cache.get::<u32>("short").await.unwrap(), None);
        assert_eq!(cache.get::<u32>("long").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn remove_by_prefix_only_touches_matching_keys() {
        let cache = store();
        let ttl = Duration::from_secs(60);
        cache.set("permissions.allowed-1-A", &true, ttl).await.unwrap();
        cache.set("permissions.allowedaction-1-A-Edit", &false, ttl).await.unwrap();
        cache.set("permissionsX", &true, ttl).await.unwrap();
        cache.set("users.profile-1", &"alice", ttl).await.unwrap();

        let removed = cache.remove_by_prefix("permissions.").await;

        assert_eq!(removed, 2);
        assert_eq!(cache.get::<bool>("permissions.allowed-1-A").await.unwrap(), None);
        assert_eq!(
            cache.get::<bool>("permissions.allowedaction-1-A-Edit").await.unwrap(),
            None
        );
        assert_eq!(cache.get::<bool>("permissionsX").await.unwrap(), Some(true));
        assert_eq!(
            cache.get::<String>("users.profile-1").await.unwrap(),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let cache = store();
        cache.set_default("a", &1u8).await.unwrap();
        cache.set_default("b", &2u8).await.unwrap();

        cache.remove("a").await;
        assert_eq!(cache.get::<u8>("a").await.unwrap(), None);
        assert_eq!(cache.get::<u8>("b").await.unwrap(), Some(2));

        cache.clear();
        assert_eq!(cache.get::<u8>("b").await.unwrap(), None);
        assert_eq!(cache.remove_by_prefix("").await, 0);
    }

    #[tokio::test]
    async fn optional_values_distinguish_cached_none_from_miss() {
        let cache = store();
        cache
            .set("override", &Option::<bool>::None, Duration::from_secs(60))
            .await
            .unwrap();
        let cached: Option<Option<bool>> = cache.get("override").await.unwrap();
        assert_eq!(cached, Some(None));
    }

    #[tokio::test]
    async fn decode_mismatch_is_an_error() {
        let cache = store();
        cache.set_default("k", &"not a bool").await.unwrap();
        let err = cache.get::<bool>("k").await.unwrap_err();
        assert!(matches!(err, CacheError::Decode { .. }));
    }
}
