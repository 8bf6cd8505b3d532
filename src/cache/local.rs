//! Local Cache Tier
//!
//! In-process fallback store used when the remote tier is unavailable, and
//! as a redundant mirror of every write while it is up.
//!
//! # Design
//!
//! - TTL map with lazy expiry on read and a periodic background sweep
//! - Values serialized as JSON; payloads over 1 KB LZ4-compressed
//! - When the store exceeds its capacity, the oldest entries by insertion
//!   time are evicted (approximate LRU: insertion time, not last access)
//! - Hit/miss counters updated on every read
//!
//! `get_or_set` does not coalesce concurrent misses: each caller runs the
//! fetcher independently and the last writer wins.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::compression::{PayloadCodec, DEFAULT_COMPRESSION_THRESHOLD};
use super::entry::CacheEntry;
use super::CacheCategory;
use crate::error::Result;

/// Local cache configuration
#[derive(Debug, Clone)]
pub struct LocalCacheConfig {
    /// Maximum number of entries before insertion-order eviction
    pub max_entries: usize,
    /// Serialized size above which payloads are compressed
    pub compression_threshold: usize,
    /// Whether compression is applied at all
    pub compression_enabled: bool,
    /// Interval between background sweeps of expired entries
    pub sweep_interval: Duration,
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_enabled: true,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct Inner {
    entries: RwLock<HashMap<String, CacheEntry>>,
    codec: PayloadCodec,
    config: LocalCacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Inner {
    /// Remove expired entries, then restore capacity if still over it
    fn sweep(&self) {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        self.evict_over_capacity(&mut entries);

        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "local cache sweep");
        }
    }

    /// Evict oldest-by-insertion entries until the store fits its capacity
    fn evict_over_capacity(&self, entries: &mut HashMap<String, CacheEntry>) {
        if entries.len() <= self.config.max_entries {
            return;
        }

        let mut by_age: Vec<(String, std::time::Instant)> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.inserted_at()))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);

        let excess = entries.len() - self.config.max_entries;
        for (key, _) in by_age.into_iter().take(excess) {
            entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

struct SweeperHandle {
    token: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.token.cancel();
        self.task.abort();
    }
}

/// In-process TTL cache (the local tier)
pub struct LocalCache {
    inner: Arc<Inner>,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl LocalCache {
    /// Create a new local cache with default configuration
    pub fn new() -> Self {
        Self::with_config(LocalCacheConfig::default())
    }

    /// Create a new local cache with custom configuration
    pub fn with_config(config: LocalCacheConfig) -> Self {
        let codec = PayloadCodec::with_threshold(config.compression_threshold);
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                codec,
                config,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
            sweeper: Mutex::new(None),
        }
    }

    /// Start the background sweep task. Idempotent; must be called from
    /// within a tokio runtime. The task stops when the cache is dropped or
    /// [`stop_sweeper`](Self::stop_sweeper) is called.
    pub fn start_sweeper(&self) {
        let mut guard = self.sweeper.lock();
        if guard.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let stop = token.clone();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.sweep_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => match weak.upgrade() {
                        Some(inner) => inner.sweep(),
                        None => break,
                    },
                }
            }
        });

        *guard = Some(SweeperHandle { token, task });
    }

    /// Stop the background sweep task
    pub fn stop_sweeper(&self) {
        self.sweeper.lock().take();
    }

    /// Get a value. Expired or malformed entries are removed and count as
    /// misses; callers never see the compressed form.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cached = self.inner.entries.read().get(key).cloned();

        let entry = match cached {
            Some(entry) => entry,
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if entry.is_expired() {
            self.inner.entries.write().remove(key);
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let decoded = self
            .inner
            .codec
            .decode(entry.payload(), entry.is_compressed())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(Into::into));

        match decoded {
            Ok(value) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "dropping malformed local cache entry");
                self.inner.entries.write().remove(key);
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value. The TTL defaults to the category's when omitted.
    /// Returns false if the value could not be serialized.
    pub fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        category: CacheCategory,
    ) -> bool {
        let serialized = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize value for local cache");
                return false;
            }
        };

        let (payload, compressed) =
            if category.compress() && self.inner.config.compression_enabled {
                match self.inner.codec.encode(serialized) {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        warn!(key, error = %e, "failed to compress value for local cache");
                        return false;
                    }
                }
            } else {
                (Bytes::from(serialized), false)
            };

        let ttl = ttl.unwrap_or_else(|| category.default_ttl());
        let entry = CacheEntry::new(payload, ttl, compressed);

        let mut entries = self.inner.entries.write();
        entries.insert(key.to_string(), entry);
        self.inner.evict_over_capacity(&mut entries);

        true
    }

    /// Get a value or compute and store it on miss. Fetcher errors propagate
    /// uncached. Concurrent misses on the same key are not deduplicated.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        ttl: Option<Duration>,
        category: CacheCategory,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = fetcher().await?;
        self.set(key, &value, ttl, category);
        Ok(value)
    }

    /// Whether a live (non-expired) entry exists for the key
    pub fn has(&self, key: &str) -> bool {
        let expired = match self.inner.entries.read().get(key) {
            Some(entry) => entry.is_expired(),
            None => return false,
        };

        if expired {
            self.inner.entries.write().remove(key);
            return false;
        }
        true
    }

    /// Delete one key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.entries.write().remove(key).is_some()
    }

    /// Delete every key containing the given substring. Returns the count.
    pub fn clear_by_pattern(&self, pattern: &str) -> usize {
        let mut entries = self.inner.entries.write();
        let matching: Vec<String> = entries
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();

        for key in &matching {
            entries.remove(key);
        }
        matching.len()
    }

    /// Remove all entries and reset counters
    pub fn clear(&self) {
        self.inner.entries.write().clear();
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
    }

    /// Number of stored entries (including not-yet-swept expired ones)
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// Hit count
    pub fn hits(&self) -> u64 {
        self.inner.hits.load(Ordering::Relaxed)
    }

    /// Miss count
    pub fn misses(&self) -> u64 {
        self.inner.misses.load(Ordering::Relaxed)
    }

    /// Get cache statistics
    pub fn stats(&self) -> LocalCacheStats {
        let hits = self.hits();
        let misses = self.misses();
        let total = hits + misses;
        let hit_rate = if total > 0 {
            ((hits as f64 / total as f64) * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        LocalCacheStats {
            entries: self.len(),
            max_entries: self.inner.config.max_entries,
            hits,
            misses,
            hit_rate,
            evictions: self.inner.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Local cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct LocalCacheStats {
    /// Current number of entries
    pub entries: usize,
    /// Configured capacity
    pub max_entries: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Hit rate percentage, rounded to 2 decimals
    pub hit_rate: f64,
    /// Entries evicted for capacity
    pub evictions: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache(max_entries: usize) -> LocalCache {
        LocalCache::with_config(LocalCacheConfig {
            max_entries,
            ..Default::default()
        })
    }

    #[test]
    fn test_set_get_roundtrip() {
        let cache = LocalCache::new();

        assert!(cache.set("k", &"value".to_string(), None, CacheCategory::Default));
        let got: Option<String> = cache.get("k");
        assert_eq!(got.as_deref(), Some("value"));
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_miss_counter() {
        let cache = LocalCache::new();

        let got: Option<String> = cache.get("absent");
        assert!(got.is_none());
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn test_ttl_expiry_on_read() {
        let cache = LocalCache::new();

        cache.set(
            "k",
            &42u32,
            Some(Duration::from_millis(20)),
            CacheCategory::Default,
        );
        assert_eq!(cache.get::<u32>("k"), Some(42));

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get::<u32>("k"), None);
        // The expired entry was removed, not just hidden
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_has_respects_expiry() {
        let cache = LocalCache::new();

        cache.set(
            "k",
            &1u8,
            Some(Duration::from_millis(10)),
            CacheCategory::Default,
        );
        assert!(cache.has("k"));

        std::thread::sleep(Duration::from_millis(20));
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_large_value_roundtrips_transparently() {
        let cache = LocalCache::new();

        // Well past the 1KB compression threshold
        let value: Vec<String> = (0..200).map(|i| format!("row-{i}")).collect();
        assert!(cache.set("big", &value, None, CacheCategory::Bonuses));

        let got: Option<Vec<String>> = cache.get("big");
        assert_eq!(got, Some(value));
    }

    #[test]
    fn test_delete() {
        let cache = LocalCache::new();

        cache.set("k", &1u8, None, CacheCategory::Default);
        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
    }

    #[test]
    fn test_clear_by_pattern() {
        let cache = LocalCache::new();

        cache.set("bonuses:E001:2025:all", &1u8, None, CacheCategory::Bonuses);
        cache.set("bonuses:E001:2024:all", &1u8, None, CacheCategory::Bonuses);
        cache.set("bonuses:E002:2025:all", &1u8, None, CacheCategory::Bonuses);

        let removed = cache.clear_by_pattern("bonuses:E001:");
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.has("bonuses:E002:2025:all"));
    }

    #[test]
    fn test_capacity_eviction_drops_oldest() {
        let cache = small_cache(3);

        for i in 0..5 {
            cache.set(&format!("k{i}"), &i, None, CacheCategory::Default);
            std::thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(cache.len(), 3);
        // The two oldest entries were evicted
        assert!(!cache.has("k0"));
        assert!(!cache.has("k1"));
        assert!(cache.has("k4"));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[tokio::test]
    async fn test_get_or_set_fetches_once() {
        use std::sync::atomic::AtomicU32;

        let cache = LocalCache::new();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let value: u32 = cache
                .get_or_set(
                    "k",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(7)
                    },
                    None,
                    CacheCategory::Default,
                )
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_set_propagates_fetcher_error_uncached() {
        let cache = LocalCache::new();

        let result: Result<u32> = cache
            .get_or_set(
                "k",
                || async { Err(crate::error::Error::Upstream("db down".into())) },
                None,
                CacheCategory::Default,
            )
            .await;

        assert!(result.is_err());
        assert!(!cache.has("k"));
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache = LocalCache::with_config(LocalCacheConfig {
            sweep_interval: Duration::from_millis(30),
            ..Default::default()
        });
        cache.start_sweeper();

        cache.set(
            "k",
            &1u8,
            Some(Duration::from_millis(10)),
            CacheCategory::Default,
        );
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Swept without any read touching the key
        assert_eq!(cache.len(), 0);

        cache.stop_sweeper();
    }

    #[test]
    fn test_stats() {
        let cache = LocalCache::new();

        cache.set("k", &1u8, None, CacheCategory::Default);
        let _: Option<u8> = cache.get("k");
        let _: Option<u8> = cache.get("absent");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 50.0);
    }
}
