//! Bonus Engine Data Model
//!
//! Typed structs at the module boundary: raw upstream rows are parsed into
//! [`DeductionRecord`] once at ingestion, and everything the presentation
//! layer consumes is serialized in camelCase per the downstream contract.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::rules::DeductionCode;
use crate::error::{Error, Result};

/// English month names indexed by `month - 1`
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Display name for a 1-based month number
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("Unknown")
}

// =============================================================================
// Upstream Input
// =============================================================================

/// One raw novelty row from the upstream data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionRecord {
    /// Employee the novelty belongs to
    pub employee_code: String,
    /// Novelty code, parsed into the closed rule-code set
    pub code: DeductionCode,
    /// First day of the novelty
    pub start_date: NaiveDate,
    /// Last day, None while the novelty is ongoing
    pub end_date: Option<NaiveDate>,
    /// Freeform upstream notes
    pub notes: Option<String>,
}

impl DeductionRecord {
    /// Build a validated record. The end date, when present, must not
    /// precede the start date.
    pub fn try_new(
        employee_code: impl Into<String>,
        code: DeductionCode,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        notes: Option<String>,
    ) -> Result<Self> {
        if let Some(end) = end_date {
            if end < start_date {
                return Err(Error::InvalidDateRange {
                    start: start_date,
                    end,
                });
            }
        }

        Ok(Self {
            employee_code: employee_code.into(),
            code,
            start_date,
            end_date,
            notes,
        })
    }
}

// =============================================================================
// Computed Output
// =============================================================================

/// One record evaluated against the rule table and a base amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDeduction {
    /// Rule code (the raw code for unknown rules)
    pub code: String,
    /// Rule label, or a marker for unrecognized codes
    pub label: String,
    /// First day of the record
    pub start_date: NaiveDate,
    /// Last day, None while ongoing
    pub end_date: Option<NaiveDate>,
    /// Inclusive day count of the record's span
    pub days: i64,
    /// Currency deducted; zero for unknown codes
    pub amount: f64,
    /// Upstream notes carried through for display
    pub notes: Option<String>,
}

/// One month's bonus outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBonus {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    /// Base bonus programmed for the month
    pub bonus_value: f64,
    /// Deductions applied, capped at the base
    pub deduction_amount: f64,
    /// `bonus_value - deduction_amount`, never negative
    pub final_value: f64,
    /// Whether any record overlapped the month, regardless of amount
    pub has_deductions: bool,
    /// Optional display message (e.g. full bonus on a clean month)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregate over the query window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusSummary {
    /// Total bonus programmed over the window
    pub total_programmed: f64,
    /// Total bonus actually earned
    pub total_executed: f64,
    /// `executed / programmed * 100`, rounded to 2 decimals; 0 when nothing
    /// was programmed
    pub percentage: f64,
}

/// Full engine response for one query window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusReport {
    /// Base bonus for the query year
    pub base_bonus: f64,
    /// Whole-percent share of the base that was deducted
    pub deduction_percentage: f64,
    /// Total deductions over the window, capped at the base
    pub deduction_amount: f64,
    /// `base_bonus - deduction_amount`
    pub final_bonus: f64,
    /// Days until the most recent novelty stops affecting the bonus
    pub expires_in_days: Option<i64>,
    /// Programmed bonus months per year
    pub bonuses_by_year: BTreeMap<i32, u32>,
    /// Every resolved deduction in the window, newest first
    pub deductions: Vec<ResolvedDeduction>,
    /// Twelve per-month outcomes, present for year queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_bonus_data: Option<Vec<MonthlyBonus>>,
    /// Snapshot of the most recent month with any record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_month_data: Option<MonthlyBonus>,
    /// Years with recorded activity (defaults when the source has none)
    pub available_years: Vec<i32>,
    /// Months with recorded activity in the query year
    pub available_months: Vec<u32>,
    /// Window aggregate
    pub summary: BonusSummary,
}

/// Condensed current-month numbers for dashboard tiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickStats {
    pub current_bonus: f64,
    pub current_deduction_percentage: f64,
    pub total_deductions: f64,
    pub expires_in_days: Option<i64>,
}

// =============================================================================
// Tests
// =============================================================================
