//! Remote Cache Tier
//!
//! Thin client over the shared remote key-value store. Values are JSON text;
//! typed (de)serialization happens in the manager, which also interprets any
//! failure here as "remote unavailable" and falls through to the local tier.
//!
//! # Design
//!
//! - One shared connection handle per store; `connect` is idempotent
//! - Every operation ensures a live connection, reconnecting once if the
//!   handle was dropped after an earlier failure
//! - A failing operation drops the handle and propagates the error; the
//!   caller decides what that means (there is no retry loop here)

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::info;

use crate::error::{Error, Result};

/// Remote store connection settings, all optional with safe defaults
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Optional password
    pub password: Option<String>,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
        }
    }
}

impl RedisSettings {
    /// Connection URL in `redis://` form
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}/", password, self.host, self.port),
            None => format!("redis://{}:{}/", self.host, self.port),
        }
    }
}

/// Remote key-value store operations
///
/// Implemented by [`RedisStore`] for production and
/// [`InMemoryRemoteStore`] for tests.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Establish the shared connection. No-op when already connected.
    async fn connect(&self) -> Result<()>;

    /// Get the JSON text stored under a key
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store JSON text under a key with a TTL
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Delete one key. Returns whether it was present.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Delete every key matching a glob pattern. Returns the count.
    async fn del_pattern(&self, pattern: &str) -> Result<u64>;

    /// Whether a key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remaining TTL of a key, None when absent or without expiry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Remove every key in the store
    async fn flush_all(&self) -> Result<()>;
}

// =============================================================================
// Redis Store
// =============================================================================

/// Redis-backed remote store
pub struct RedisStore {
    settings: RedisSettings,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// Create an unconnected store; `connect` establishes the handle
    pub fn new(settings: RedisSettings) -> Self {
        Self {
            settings,
            conn: Mutex::new(None),
        }
    }

    /// Current connection, establishing one if none is held
    async fn connection(&self) -> Result<MultiplexedConnection> {
        if let Some(conn) = self.conn.lock().clone() {
            return Ok(conn);
        }
        self.connect().await?;
        self.conn.lock().clone().ok_or(Error::RemoteUnavailable)
    }

    /// Drop the shared handle so the next operation reconnects
    fn invalidate(&self, err: redis::RedisError) -> Error {
        *self.conn.lock() = None;
        Error::Remote(err)
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn connect(&self) -> Result<()> {
        if self.conn.lock().is_some() {
            return Ok(());
        }

        let client = redis::Client::open(self.settings.url())?;
        let conn = client.get_multiplexed_async_connection().await?;

        info!(
            host = %self.settings.host,
            port = self.settings.port,
            "connected to remote cache store"
        );
        *self.conn.lock() = Some(conn);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await.map_err(|e| self.invalidate(e))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(key, value, ttl.as_secs())
            .await
            .map_err(|e| self.invalidate(e))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(key).await.map_err(|e| self.invalidate(e))?;
        Ok(removed > 0)
    }

    async fn del_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn.keys(pattern).await.map_err(|e| self.invalidate(e))?;
        if keys.is_empty() {
            return Ok(0);
        }

        let removed: u64 = conn.del(keys).await.map_err(|e| self.invalidate(e))?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let exists: bool = conn.exists(key).await.map_err(|e| self.invalidate(e))?;
        Ok(exists)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.connection().await?;
        // -2 = missing key, -1 = no expiry
        let seconds: i64 = conn.ttl(key).await.map_err(|e| self.invalidate(e))?;
        Ok((seconds >= 0).then(|| Duration::from_secs(seconds as u64)))
    }

    async fn flush_all(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("FLUSHALL")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.invalidate(e))?;
        Ok(())
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// In-memory remote store for tests, with TTL semantics and failure injection
#[derive(Default)]
pub struct InMemoryRemoteStore {
    entries: DashMap<String, StoredValue>,
    failing: AtomicBool,
}

impl InMemoryRemoteStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Internal("injected remote store failure".into()));
        }
        Ok(())
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.expires_at > Instant::now())
            .count()
    }

    /// Whether the store holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn connect(&self) -> Result<()> {
        self.check_available()
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;

        if let Some(stored) = self.entries.get(key) {
            if stored.expires_at > Instant::now() {
                return Ok(Some(stored.value.clone()));
            }
        }
        self.entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check_available()?;

        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.entries.remove(key).is_some())
    }

    async fn del_pattern(&self, pattern: &str) -> Result<u64> {
        self.check_available()?;

        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in matching {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.check_available()?;

        Ok(self.entries.get(key).and_then(|stored| {
            let now = Instant::now();
            (stored.expires_at > now).then(|| stored.expires_at - now)
        }))
    }

    async fn flush_all(&self) -> Result<()> {
        self.check_available()?;
        self.entries.clear();
        Ok(())
    }
}

/// Minimal glob matcher supporting `*` wildcards, enough for key patterns
/// like `bonuses:E001:*`
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let mut rest = key;
    if !rest.starts_with(parts[0]) {
        return false;
    }
    rest = &rest[parts[0].len()..];

    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(parts[parts.len() - 1])
}

// =============================================================================
// Tests
// =============================================================================
