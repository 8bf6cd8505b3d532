//! Bonus Calculation Engine
//!
//! Rule-driven deduction resolution over date-ranged novelty records.
//!
//! The calculator takes raw records from an upstream [`DeductionSource`],
//! resolves each against the static rule table (percentage-of-base or
//! per-day penalties), caps the total at the per-year base bonus, and
//! produces monthly and windowed summaries. Computed reports are cached
//! through the hybrid cache.

mod calculator;
mod model;
mod rules;
mod source;

pub use calculator::BonusCalculator;
pub use model::{
    month_name, BonusReport, BonusSummary, DeductionRecord, MonthlyBonus, QuickStats,
    ResolvedDeduction, MONTH_NAMES,
};
pub use rules::{base_bonus_for_year, DeductionCode, DeductionRule, Penalty, PER_DAY_RATE};
pub use source::{DeductionSource, InMemoryDeductionSource};
