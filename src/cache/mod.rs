//! Hybrid Two-Tier Cache
//!
//! Caching for computed bonus data with a shared remote tier (Redis) and an
//! in-process fallback tier.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        HybridCache                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Remote Tier (Redis, shared)   │  Local Tier (in-process)        │
//! │  ┌──────────────────────────┐  │  ┌──────────────────────────┐   │
//! │  │ RemoteStore trait        │  │  │ TTL map + LZ4 payloads   │   │
//! │  │ JSON text values         │  │  │ background sweep task    │   │
//! │  │ KEYS/DEL invalidation    │  │  │ insertion-order eviction │   │
//! │  └──────────────────────────┘  │  └──────────────────────────┘   │
//! │         │ any failure demotes to local-only │                    │
//! │         └────────────────────────────────────                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The remote tier is preferred while it is reachable; the first failing
//! operation demotes the manager to local-only until an explicit reconnect.
//! Writes are mirrored to both tiers so a remote outage degrades to stale
//! but available data instead of an error.

mod entry;
mod local;
mod manager;
mod remote;
pub mod compression;
pub mod keys;

pub use entry::CacheEntry;
pub use local::{LocalCache, LocalCacheConfig, LocalCacheStats};
pub use manager::{CacheStats, HybridCache};
pub use remote::{InMemoryRemoteStore, RedisSettings, RedisStore, RemoteStore};

use std::time::Duration;

/// TTL classes in seconds, shared by both tiers
pub mod ttl {
    /// 15 minutes
    pub const SHORT: u64 = 15 * 60;
    /// 1 hour
    pub const HOURLY: u64 = 60 * 60;
    /// 1 day
    pub const DAILY: u64 = 24 * 60 * 60;
    /// 7 days
    pub const WEEKLY: u64 = 7 * 24 * 60 * 60;
}

/// Cache entry categories, each with a default TTL and compression policy
///
/// Callers that do not pass an explicit TTL get the category default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheCategory {
    /// Short-lived miscellaneous data
    #[default]
    Default,
    /// Per-user lookups (long-lived, small, stored uncompressed)
    Users,
    /// Aggregate statistics (short-lived)
    Statistics,
    /// Computed bonus windows
    Bonuses,
    /// Kilometer/distance summaries
    Kilometers,
}

impl CacheCategory {
    /// Default TTL applied when the caller omits an explicit one
    pub fn default_ttl(&self) -> Duration {
        let seconds = match self {
            CacheCategory::Default => ttl::SHORT,
            CacheCategory::Users => ttl::WEEKLY,
            CacheCategory::Statistics => ttl::SHORT,
            CacheCategory::Bonuses => ttl::WEEKLY,
            CacheCategory::Kilometers => ttl::WEEKLY,
        };
        Duration::from_secs(seconds)
    }

    /// Whether large payloads of this category are compressed in the local tier
    pub fn compress(&self) -> bool {
        !matches!(self, CacheCategory::Users)
    }
}

// =============================================================================
// Tests
// =============================================================================
