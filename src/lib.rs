//! bonocore - Operator Performance Bonus Engine
//!
//! The calculation core of the operator-performance dashboard: a rule-driven
//! bonus/deduction calculator fronted by a hybrid two-tier cache.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         BonusCalculator                           │
//! │   rule table · month overlap · capping · 12-month sweeps          │
//! └───────────────┬───────────────────────────────┬───────────────────┘
//!                 │                               │
//!        ┌────────▼─────────┐            ┌────────▼─────────┐
//!        │   HybridCache    │            │ DeductionSource  │
//!        │ remote ⇄ local   │            │ (upstream rows)  │
//!        └──────────────────┘            └──────────────────┘
//! ```
//!
//! The cache prefers a shared remote store (Redis) and fails open to an
//! in-process TTL store on any remote failure; the upstream data source is
//! behind a trait so the engine never builds SQL.
//!
//! # Modules
//!
//! - [`bonus`] - Rule table, record model, calculator, upstream source trait
//! - [`cache`] - Remote client, local TTL store, hybrid failover manager
//! - [`error`] - Error types

pub mod bonus;
pub mod cache;
pub mod error;

// Re-export commonly used types
pub use bonus::{BonusCalculator, BonusReport, DeductionCode, DeductionRecord, DeductionSource};
pub use cache::{CacheCategory, HybridCache, LocalCache, RedisSettings, RedisStore, RemoteStore};
pub use error::{Error, Result};
