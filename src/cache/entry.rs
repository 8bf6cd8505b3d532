//! Local-Tier Cache Entry
//!
//! One cached value in the in-process tier: the serialized (possibly
//! compressed) payload plus the bookkeeping needed for expiry and
//! insertion-order eviction.

use std::time::{Duration, Instant};

use bytes::Bytes;

/// One cached value in the local tier
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized payload, LZ4-compressed when `compressed` is set
    payload: Bytes,
    /// Insertion timestamp, also the eviction ordering key
    inserted_at: Instant,
    /// Time to live from insertion
    ttl: Duration,
    /// Whether `payload` is compressed
    compressed: bool,
}

impl CacheEntry {
    /// Create a new entry stamped with the current time
    pub fn new(payload: Bytes, ttl: Duration, compressed: bool) -> Self {
        Self {
            payload,
            inserted_at: Instant::now(),
            ttl,
            compressed,
        }
    }

    /// Serialized payload bytes
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Insertion timestamp
    #[inline]
    pub fn inserted_at(&self) -> Instant {
        self.inserted_at
    }

    /// Whether the payload is compressed
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// An entry is expired iff more than its TTL has elapsed since insertion
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }

    /// Payload size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new(
            Bytes::from_static(b"payload"),
            Duration::from_secs(60),
            false,
        );
        assert_eq!(entry.payload().as_ref(), b"payload");
        assert_eq!(entry.size(), 7);
        assert!(!entry.is_compressed());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiry() {
        let entry = CacheEntry::new(Bytes::from_static(b"x"), Duration::ZERO, false);
        std::thread::sleep(Duration::from_millis(5));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_entry_insertion_ordering() {
        let first = CacheEntry::new(Bytes::new(), Duration::from_secs(60), false);
        std::thread::sleep(Duration::from_millis(2));
        let second = CacheEntry::new(Bytes::new(), Duration::from_secs(60), false);
        assert!(first.inserted_at() < second.inserted_at());
    }
}
