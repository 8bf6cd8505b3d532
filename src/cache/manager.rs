//! Hybrid Cache Manager
//!
//! Orchestrates the remote (shared) and local (in-process) tiers.
//!
//! # Failover
//!
//! The manager is either `REMOTE_UP` or `REMOTE_DOWN` (local-only). The
//! initial state comes from a connection attempt at construction time that
//! never blocks startup on failure. Any remote failure while up demotes the
//! manager for all subsequent operations; the failing call itself falls
//! through to the local tier. Recovery is by explicit [`reconnect`] only —
//! availability is assumed optimistically, there is no health-check loop.
//!
//! Writes are mirrored to both tiers while the remote is up, so readers keep
//! getting data through an outage. The local tier is a best-effort mirror,
//! not a coherent replica: after an outage, instances can disagree until the
//! remote tier is repopulated.
//!
//! [`reconnect`]: HybridCache::reconnect

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use super::keys;
use super::local::{LocalCache, LocalCacheConfig, LocalCacheStats};
use super::remote::{InMemoryRemoteStore, RemoteStore};
use super::CacheCategory;
use crate::error::{Error, Result};

/// Two-tier cache with remote-first reads and fail-open demotion
pub struct HybridCache {
    remote: Arc<dyn RemoteStore>,
    local: LocalCache,
    remote_up: AtomicBool,
}

impl HybridCache {
    /// Build the cache around a remote store and start the local sweeper.
    /// A failed connection attempt logs and starts in local-only mode.
    pub async fn connect(remote: Arc<dyn RemoteStore>, local_config: LocalCacheConfig) -> Self {
        let local = LocalCache::with_config(local_config);
        local.start_sweeper();

        let remote_up = match remote.connect().await {
            Ok(()) => {
                info!("hybrid cache online, remote tier connected");
                true
            }
            Err(e) => {
                warn!(error = %e, "remote tier unavailable at startup, serving from local tier");
                false
            }
        };

        Self {
            remote,
            local,
            remote_up: AtomicBool::new(remote_up),
        }
    }

    /// Cache backed by an in-memory remote store, for tests and demos.
    /// The local sweeper is not started; expiry is lazy.
    pub fn in_memory() -> Self {
        Self {
            remote: Arc::new(InMemoryRemoteStore::new()),
            local: LocalCache::new(),
            remote_up: AtomicBool::new(true),
        }
    }

    /// Whether the remote tier is currently considered reachable
    pub fn is_remote_up(&self) -> bool {
        self.remote_up.load(Ordering::SeqCst)
    }

    /// Demote to local-only; logs only on the transition
    fn demote(&self, operation: &str, err: &Error) {
        if self.remote_up.swap(false, Ordering::SeqCst) {
            warn!(operation, error = %err, "remote tier failure, demoting to local-only");
        }
    }

    /// Explicitly re-establish the remote tier. Never invoked automatically.
    pub async fn reconnect(&self) -> Result<()> {
        self.remote.connect().await?;
        self.remote_up.store(true, Ordering::SeqCst);
        info!("remote tier reconnected");
        Ok(())
    }

    /// Get a value, remote tier first. Remote misses, malformed payloads and
    /// failures all fall through to the local tier; nothing raises.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if self.is_remote_up() {
            match self.remote.get(key).await {
                Ok(Some(text)) => match serde_json::from_str(&text) {
                    Ok(value) => return Some(value),
                    Err(e) => {
                        warn!(key, error = %e, "malformed remote payload, treating as miss")
                    }
                },
                Ok(None) => {}
                Err(e) => self.demote("get", &e),
            }
        }
        self.local.get(key)
    }

    /// Store a value in the remote tier (when up) and always in the local
    /// tier for redundancy. True if either write succeeded.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        category: CacheCategory,
    ) -> bool {
        let ttl = ttl.unwrap_or_else(|| category.default_ttl());

        let mut remote_ok = false;
        if self.is_remote_up() {
            match serde_json::to_string(value) {
                Ok(text) => match self.remote.set(key, &text, ttl).await {
                    Ok(()) => remote_ok = true,
                    Err(e) => self.demote("set", &e),
                },
                Err(e) => warn!(key, error = %e, "failed to serialize value for remote tier"),
            }
        }

        let local_ok = self.local.set(key, value, Some(ttl), category);
        remote_ok || local_ok
    }

    /// Get a value or compute and store it on miss. Fetcher errors propagate
    /// uncached; concurrent misses are not deduplicated.
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
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = fetcher().await?;
        self.set(key, &value, ttl, category).await;
        Ok(value)
    }

    /// Delete one key from both tiers. True if either tier held it.
    pub async fn del(&self, key: &str) -> bool {
        let mut remote_ok = false;
        if self.is_remote_up() {
            match self.remote.del(key).await {
                Ok(removed) => remote_ok = removed,
                Err(e) => self.demote("del", &e),
            }
        }

        let local_ok = self.local.delete(key);
        remote_ok || local_ok
    }

    /// Delete keys matching a glob pattern from both tiers. The count is the
    /// sum over tiers; a key mirrored in both counts twice.
    pub async fn del_pattern(&self, pattern: &str) -> u64 {
        let mut count = 0;
        if self.is_remote_up() {
            match self.remote.del_pattern(pattern).await {
                Ok(removed) => count += removed,
                Err(e) => self.demote("del_pattern", &e),
            }
        }

        // The local tier matches on substrings; drop the glob suffix
        count += self.local.clear_by_pattern(pattern.trim_end_matches('*')) as u64;
        count
    }

    /// Clear every cached window for one user across both tiers, e.g. after
    /// an administrator logs the user out or their records change
    pub async fn invalidate_user(&self, user_code: &str) -> u64 {
        let mut count = 0;
        for pattern in keys::user_patterns(user_code) {
            count += self.del_pattern(&pattern).await;
        }

        info!(user_code, removed = count, "invalidated user cache");
        count
    }

    /// Whether a key exists in either tier
    pub async fn exists(&self, key: &str) -> bool {
        if self.is_remote_up() {
            match self.remote.exists(key).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => self.demote("exists", &e),
            }
        }
        self.local.has(key)
    }

    /// Clear both tiers completely
    pub async fn flush_all(&self) {
        if self.is_remote_up() {
            if let Err(e) = self.remote.flush_all().await {
                self.demote("flush_all", &e);
            }
        }
        self.local.clear();
    }

    /// Direct access to the local tier
    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    /// Combined statistics snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            remote_up: self.is_remote_up(),
            local: self.local.stats(),
        }
    }
}

/// Combined cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    /// Whether the remote tier is up
    pub remote_up: bool,
    /// Local tier statistics
    pub local: LocalCacheStats,
}

// =============================================================================
// Tests
// =============================================================================
