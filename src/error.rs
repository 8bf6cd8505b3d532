//! Error types for the bonus engine and its cache tiers

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the bonus engine
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Cache Tier Errors
    // =========================================================================
    /// Remote store (Redis) error
    #[error("remote store error: {0}")]
    Remote(#[from] redis::RedisError),

    /// Remote store has no live connection
    #[error("remote store is not connected")]
    RemoteUnavailable,

    /// Payload (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression failed
    #[error("compression failed: {0}")]
    CompressionFailed(String),

    /// Decompression failed
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    // =========================================================================
    // Calculation Errors
    // =========================================================================
    /// Upstream data source failure
    #[error("upstream data source error: {0}")]
    Upstream(String),

    /// A deduction record's end date precedes its start date
    #[error("invalid date range: end {end} precedes start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Month outside 1..=12
    #[error("invalid month: {0}")]
    InvalidMonth(u32),

    // =========================================================================
    // General Errors
    // =========================================================================
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
