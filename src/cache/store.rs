//! Two-tier response cache with TTL expiry
//!
//! Entries live in an in-memory index for fast hits and, when a
//! [`KeyValueStore`] is available, in persistent storage so fresh data
//! survives restarts. An expired entry is logically absent: it is purged
//! lazily whenever a read finds it and eagerly by the one-shot startup
//! sweep. A persisted write that fails (storage full) triggers an eviction
//! pass over the oldest entries and one retry; a second failure leaves the
//! value valid in memory only and is never surfaced to the caller.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::storage::KeyValueStore;

/// Separator between the source id and the sub key. Neither component may
/// contain it; both are internal (registry ids and generated page keys).
const KEY_SEPARATOR: char = ':';

/// Fraction of persisted entries dropped, oldest first, when a write hits a
/// storage-full condition.
const EVICTION_FRACTION: f64 = 0.3;

/// A cached value with its write time and lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: serde_json::Value,
    stored_at: DateTime<Utc>,
    ttl_ms: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        age > chrono::Duration::milliseconds(self.ttl_ms as i64)
    }
}

/// Counters reported by [`CacheStore::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held in the in-memory index
    pub memory_entries: usize,
    /// Entries currently persisted
    pub persisted_entries: usize,
    /// Persisted entries that are already expired
    pub expired_entries: usize,
}

/// The cache entry store.
pub struct CacheStore {
    memory: Mutex<HashMap<String, CacheEntry>>,
    storage: Option<Box<dyn KeyValueStore>>,
}

impl CacheStore {
    /// Cache backed by the given persistent store.
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            storage: Some(storage),
        }
    }

    /// Cache with no persistence; used when no cache directory exists.
    pub fn in_memory() -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            storage: None,
        }
    }

    fn compose_key(source_id: &str, sub_key: &str) -> String {
        debug_assert!(
            !source_id.contains(KEY_SEPARATOR) && !sub_key.contains(KEY_SEPARATOR),
            "cache key components must not contain '{}'",
            KEY_SEPARATOR
        );
        format!("{}{}{}", source_id, KEY_SEPARATOR, sub_key)
    }

    /// Looks up a fresh entry, memory tier first.
    ///
    /// A persisted hit is promoted into the in-memory index. An expired or
    /// unreadable record found in either tier is deleted from that tier and
    /// treated as absent.
    pub fn get<T: DeserializeOwned>(&self, source_id: &str, sub_key: &str) -> Option<T> {
        let key = Self::compose_key(source_id, sub_key);
        let now = Utc::now();

        {
            let mut memory = self.memory.lock().unwrap();
            if let Some(entry) = memory.get(&key) {
                if entry.is_expired(now) {
                    memory.remove(&key);
                } else {
                    tracing::debug!(key, "memory cache hit");
                    return serde_json::from_value(entry.value.clone()).ok();
                }
            }
        }

        let storage = self.storage.as_ref()?;
        let raw = storage.get(&key)?;
        let Ok(entry) = serde_json::from_str::<CacheEntry>(&raw) else {
            tracing::warn!(key, "removing unreadable cache record");
            storage.remove(&key);
            return None;
        };

        if entry.is_expired(now) {
            tracing::debug!(key, "cache record expired");
            storage.remove(&key);
            return None;
        }

        tracing::debug!(key, "persisted cache hit");
        let value = serde_json::from_value(entry.value.clone()).ok();
        self.memory.lock().unwrap().insert(key, entry);
        value
    }

    /// Writes a value to both tiers.
    ///
    /// Persistence failures are soft: after a failed write the oldest 30%
    /// of persisted entries are evicted and the write retried once; if that
    /// also fails the value stays in memory only.
    pub fn set<T: Serialize>(&self, source_id: &str, sub_key: &str, value: &T, ttl: Duration) {
        let key = Self::compose_key(source_id, sub_key);
        let entry = CacheEntry {
            value: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
            stored_at: Utc::now(),
            ttl_ms: ttl.as_millis() as u64,
        };

        let serialized = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache entry not serializable");
                return;
            }
        };

        let ttl_ms = entry.ttl_ms;
        self.memory.lock().unwrap().insert(key.clone(), entry);

        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        if let Err(first) = storage.set(&key, &serialized) {
            tracing::warn!(key, error = %first, "persisted write failed, evicting oldest entries");
            self.evict_oldest();
            if let Err(second) = storage.set(&key, &serialized) {
                tracing::warn!(key, error = %second, "persisted write failed after eviction, keeping in memory only");
            }
        } else {
            tracing::debug!(key, ttl_ms, "cache write");
        }
    }

    /// Removes every entry, in both tiers, belonging to `source_id`.
    pub fn invalidate_source(&self, source_id: &str) {
        let prefix = format!("{}{}", source_id, KEY_SEPARATOR);

        self.memory
            .lock()
            .unwrap()
            .retain(|key, _| !key.starts_with(&prefix));

        if let Some(storage) = self.storage.as_ref() {
            for key in storage.keys() {
                if key.starts_with(&prefix) {
                    storage.remove(&key);
                }
            }
        }
        tracing::debug!(source_id, "source cache invalidated");
    }

    /// Scans persisted entries and removes expired or unreadable ones.
    ///
    /// Intended to run once shortly after startup; returns the number of
    /// records removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;

        {
            let mut memory = self.memory.lock().unwrap();
            let before = memory.len();
            memory.retain(|_, entry| !entry.is_expired(now));
            removed += before - memory.len();
        }

        if let Some(storage) = self.storage.as_ref() {
            for key in storage.keys() {
                let stale = match storage.get(&key) {
                    Some(raw) => match serde_json::from_str::<CacheEntry>(&raw) {
                        Ok(entry) => entry.is_expired(now),
                        Err(_) => true,
                    },
                    None => false,
                };
                if stale {
                    storage.remove(&key);
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "expired cache records swept");
        }
        removed
    }

    /// Removes the oldest 30% of persisted entries by write time.
    fn evict_oldest(&self) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };

        let mut aged: Vec<(String, DateTime<Utc>)> = storage
            .keys()
            .into_iter()
            .map(|key| {
                let stored_at = storage
                    .get(&key)
                    .and_then(|raw| serde_json::from_str::<CacheEntry>(&raw).ok())
                    .map(|entry| entry.stored_at)
                    // Unreadable records count as oldest so they go first.
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                (key, stored_at)
            })
            .collect();

        aged.sort_by_key(|(_, stored_at)| *stored_at);
        let evict_count = ((aged.len() as f64) * EVICTION_FRACTION).ceil() as usize;

        for (key, _) in aged.into_iter().take(evict_count) {
            storage.remove(&key);
        }
        tracing::info!(evict_count, "evicted oldest persisted cache entries");
    }

    /// Drops every entry in both tiers.
    pub fn clear_all(&self) {
        self.memory.lock().unwrap().clear();
        if let Some(storage) = self.storage.as_ref() {
            for key in storage.keys() {
                storage.remove(&key);
            }
        }
        tracing::debug!("cache cleared");
    }

    /// Current cache occupancy counters.
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let memory_entries = self.memory.lock().unwrap().len();

        let (persisted_entries, expired_entries) = match self.storage.as_ref() {
            None => (0, 0),
            Some(storage) => {
                let keys = storage.keys();
                let expired = keys
                    .iter()
                    .filter(|key| {
                        storage
                            .get(key)
                            .and_then(|raw| serde_json::from_str::<CacheEntry>(&raw).ok())
                            .is_some_and(|entry| entry.is_expired(now))
                    })
                    .count();
                (keys.len(), expired)
            }
        };

        CacheStats {
            memory_entries,
            persisted_entries,
            expired_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::DiskStorage;
    use std::io;
    use std::sync::{Arc, Mutex as StdMutex};
    use tempfile::TempDir;

    fn disk_cache() -> (CacheStore, TempDir) {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let storage = DiskStorage::with_dir(temp.path().to_path_buf());
        (CacheStore::new(Box::new(storage)), temp)
    }

    #[test]
    fn test_set_then_get_roundtrip() {
        let (cache, _temp) = disk_cache();
        cache.set("weibo", "list", &vec![1, 2, 3], Duration::from_secs(60));
        let value: Option<Vec<i32>> = cache.get("weibo", "list");
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_get_absent() {
        let (cache, _temp) = disk_cache();
        let value: Option<Vec<i32>> = cache.get("weibo", "list");
        assert!(value.is_none());
    }

    #[test]
    fn test_expired_entry_is_absent_and_purged() {
        let (cache, _temp) = disk_cache();
        cache.set("weibo", "list", &"stale", Duration::ZERO);
        std::thread::sleep(Duration::from_millis(10));

        let value: Option<String> = cache.get("weibo", "list");
        assert!(value.is_none());
        // Purged from both tiers on read.
        assert_eq!(cache.stats().memory_entries, 0);
        assert_eq!(cache.stats().persisted_entries, 0);
    }

    #[test]
    fn test_persisted_hit_promoted_to_memory() {
        let temp = TempDir::new().unwrap();
        let writer = CacheStore::new(Box::new(DiskStorage::with_dir(temp.path().to_path_buf())));
        writer.set("zhihu", "list", &"hello", Duration::from_secs(60));

        // A fresh store instance has an empty memory tier.
        let reader = CacheStore::new(Box::new(DiskStorage::with_dir(temp.path().to_path_buf())));
        assert_eq!(reader.stats().memory_entries, 0);
        let value: Option<String> = reader.get("zhihu", "list");
        assert_eq!(value.as_deref(), Some("hello"));
        assert_eq!(reader.stats().memory_entries, 1);
    }

    #[test]
    fn test_in_memory_fallback_works_without_storage() {
        let cache = CacheStore::in_memory();
        cache.set("weibo", "list", &42u32, Duration::from_secs(60));
        assert_eq!(cache.get::<u32>("weibo", "list"), Some(42));
        assert_eq!(cache.stats().persisted_entries, 0);
    }

    #[test]
    fn test_invalidate_source_is_prefix_scoped() {
        let (cache, _temp) = disk_cache();
        cache.set("weibo", "list", &1u32, Duration::from_secs(60));
        cache.set("weibo", "page_2_50", &2u32, Duration::from_secs(60));
        cache.set("zhihu", "list", &3u32, Duration::from_secs(60));

        cache.invalidate_source("weibo");

        assert!(cache.get::<u32>("weibo", "list").is_none());
        assert!(cache.get::<u32>("weibo", "page_2_50").is_none());
        assert_eq!(cache.get::<u32>("zhihu", "list"), Some(3));
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (cache, _temp) = disk_cache();
        cache.set("a", "x", &1u32, Duration::ZERO);
        cache.set("b", "x", &2u32, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(10));

        let removed = cache.sweep_expired();
        // Removed from memory and disk; counted per record removed.
        assert!(removed >= 1);
        assert!(cache.get::<u32>("a", "x").is_none());
        assert_eq!(cache.get::<u32>("b", "x"), Some(2));
    }

    #[test]
    fn test_sweep_removes_unreadable_records() {
        let temp = TempDir::new().unwrap();
        let storage = DiskStorage::with_dir(temp.path().to_path_buf());
        storage.set("weibo:list", "not json at all").unwrap();

        let cache = CacheStore::new(Box::new(DiskStorage::with_dir(temp.path().to_path_buf())));
        let removed = cache.sweep_expired();
        assert_eq!(removed, 1);
        assert_eq!(cache.stats().persisted_entries, 0);
    }

    /// Store that accepts a bounded number of distinct keys, then reports
    /// itself full: simulates a storage-quota condition. Clones share the
    /// same backing map so tests can inspect it from outside the cache.
    #[derive(Clone)]
    struct CappedStorage {
        inner: Arc<StdMutex<HashMap<String, String>>>,
        capacity: usize,
    }

    impl CappedStorage {
        fn new(capacity: usize) -> Self {
            Self {
                inner: Arc::new(StdMutex::new(HashMap::new())),
                capacity,
            }
        }
    }

    impl KeyValueStore for CappedStorage {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) -> io::Result<()> {
            let mut map = self.inner.lock().unwrap();
            if !map.contains_key(key) && map.len() >= self.capacity {
                return Err(io::Error::new(io::ErrorKind::Other, "quota exceeded"));
            }
            map.insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) {
            self.inner.lock().unwrap().remove(key);
        }

        fn keys(&self) -> Vec<String> {
            self.inner.lock().unwrap().keys().cloned().collect()
        }
    }

    #[test]
    fn test_quota_eviction_then_successful_retry() {
        let storage = CappedStorage::new(4);
        let cache = CacheStore::new(Box::new(storage.clone()));
        for (i, source) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.set(source, "x", &(i as u32), Duration::from_secs(60));
            // Distinct stored_at ordering for the eviction sort.
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(cache.stats().persisted_entries, 4);

        // Store is full: the write must evict ceil(4 * 0.3) = 2 oldest
        // entries and then land.
        cache.set("e", "x", &99u32, Duration::from_secs(60));

        assert_eq!(cache.get::<u32>("e", "x"), Some(99));
        let mut persisted = storage.keys();
        persisted.sort();
        assert_eq!(persisted, vec!["c:x", "d:x", "e:x"]);
    }

    #[test]
    fn test_quota_double_failure_is_soft() {
        // Zero capacity: even the post-eviction retry fails. The value must
        // still be readable from the memory tier and no panic or error
        // reaches the caller.
        let cache = CacheStore::new(Box::new(CappedStorage::new(0)));
        cache.set("weibo", "list", &7u32, Duration::from_secs(60));
        assert_eq!(cache.get::<u32>("weibo", "list"), Some(7));
        assert_eq!(cache.stats().persisted_entries, 0);
    }

    #[test]
    fn test_stats_counts_expired() {
        let (cache, _temp) = disk_cache();
        cache.set("a", "x", &1u32, Duration::ZERO);
        cache.set("b", "x", &2u32, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(10));

        let stats = cache.stats();
        assert_eq!(stats.persisted_entries, 2);
        assert_eq!(stats.expired_entries, 1);
    }

    #[test]
    fn test_clear_all() {
        let (cache, _temp) = disk_cache();
        cache.set("a", "x", &1u32, Duration::from_secs(60));
        cache.set("b", "x", &2u32, Duration::from_secs(60));
        cache.clear_all();
        let stats = cache.stats();
        assert_eq!(stats.memory_entries, 0);
        assert_eq!(stats.persisted_entries, 0);
    }
}
