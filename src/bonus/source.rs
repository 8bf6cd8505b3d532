//! Upstream Deduction Source
//!
//! The relational source of raw novelty rows, modeled as a trait so the
//! calculator never sees SQL. Production wires a database-backed
//! implementation; tests and demos use [`InMemoryDeductionSource`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Datelike;
use parking_lot::RwLock;

use super::model::DeductionRecord;
use crate::error::{Error, Result};

/// Provider of raw deduction records for one employee
#[async_trait]
pub trait DeductionSource: Send + Sync {
    /// Every raw novelty row for the employee, newest first
    async fn records_for(&self, employee_code: &str) -> Result<Vec<DeductionRecord>>;

    /// Distinct years with recorded activity, newest first
    async fn active_years(&self, employee_code: &str) -> Result<Vec<i32>> {
        let mut years: Vec<i32> = self
            .records_for(employee_code)
            .await?
            .iter()
            .map(|record| record.start_date.year())
            .collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        Ok(years)
    }

    /// Distinct months with recorded activity in one year, ascending
    async fn active_months(&self, employee_code: &str, year: i32) -> Result<Vec<u32>> {
        let mut months: Vec<u32> = self
            .records_for(employee_code)
            .await?
            .iter()
            .filter(|record| record.start_date.year() == year)
            .map(|record| record.start_date.month())
            .collect();
        months.sort_unstable();
        months.dedup();
        Ok(months)
    }
}

/// In-memory source for tests and demos, with a fetch counter and failure
/// injection
#[derive(Default)]
pub struct InMemoryDeductionSource {
    records: RwLock<Vec<DeductionRecord>>,
    fetches: AtomicU64,
    failing: AtomicBool,
}

impl InMemoryDeductionSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source pre-loaded with records
    pub fn with_records(records: Vec<DeductionRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Default::default()
        }
    }

    /// Add one record
    pub fn push(&self, record: DeductionRecord) {
        self.records.write().push(record);
    }

    /// Make every subsequent fetch fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// How many fetches have been served
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeductionSource for InMemoryDeductionSource {
    async fn records_for(&self, employee_code: &str) -> Result<Vec<DeductionRecord>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Upstream("injected data source failure".into()));
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let mut records: Vec<DeductionRecord> = self
            .records
            .read()
            .iter()
            .filter(|record| record.employee_code == employee_code)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(records)
    }
}

// =============================================================================
// Tests
// =============================================================================
