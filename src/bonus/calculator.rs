//! Bonus Calculator
//!
//! Resolves date-ranged deduction records against the rule table and a
//! per-year base amount, producing per-month outcomes and window aggregates.
//! Results are cached through the hybrid cache under
//! `bonuses:{user}:{year|current}:{month|all}` keys.
//!
//! # Algorithm
//!
//! 1. Look up the base bonus for the query year
//! 2. Select the records overlapping the query window; a record overlaps a
//!    month when its start falls inside it, its (effective) end falls inside
//!    it, or it spans the whole month — ongoing records run to today
//! 3. Resolve each record: percentage rules take a fraction of the base,
//!    per-day rules multiply the rate by the inclusive day span, unknown
//!    codes resolve to zero
//! 4. Cap the summed deductions at the base; the bonus reaches zero but
//!    never goes negative
//! 5. For year queries, compute all 12 months independently and add a
//!    most-recent-month snapshot; a failing month is scored as zero executed
//!    while its base still counts as programmed

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Days, Local, NaiveDate};
use tracing::{error, warn};

use super::model::{
    month_name, BonusReport, BonusSummary, DeductionRecord, MonthlyBonus, QuickStats,
    ResolvedDeduction,
};
use super::rules::{base_bonus_for_year, Penalty};
use super::source::DeductionSource;
use crate::cache::{keys, ttl, CacheCategory, HybridCache};
use crate::error::{Error, Result};

/// Days a novelty keeps affecting the displayed bonus after it starts
const NOVELTY_EFFECT_DAYS: u64 = 14;

/// First year the dashboard tracks programmed bonuses for
const FIRST_TRACKED_YEAR: i32 = 2020;

/// Rule-driven bonus calculator over an upstream record source
pub struct BonusCalculator {
    source: Arc<dyn DeductionSource>,
    cache: Arc<HybridCache>,
}

impl BonusCalculator {
    /// Build a calculator over a record source and a cache
    pub fn new(source: Arc<dyn DeductionSource>, cache: Arc<HybridCache>) -> Self {
        Self { source, cache }
    }

    /// Full bonus report for one user and query window, served from cache
    /// when possible. Upstream failures propagate uncached.
    pub async fn user_bonuses(
        &self,
        user_code: &str,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<BonusReport> {
        if let Some(m) = month {
            if !(1..=12).contains(&m) {
                return Err(Error::InvalidMonth(m));
            }
        }

        let key = keys::bonus_window(user_code, year, month);
        self.cache
            .get_or_set(
                &key,
                || self.compute_report(user_code, year, month),
                Some(Duration::from_secs(ttl::WEEKLY)),
                CacheCategory::Bonuses,
            )
            .await
    }

    /// Condensed current-month numbers for dashboard tiles, cached briefly
    pub async fn quick_stats(&self, user_code: &str) -> Result<QuickStats> {
        let now = today();
        let (year, month) = (now.year(), now.month());

        let key = keys::user_data(
            user_code,
            "bonus-quick-stats",
            &[("year", year.to_string()), ("month", month.to_string())],
        );

        self.cache
            .get_or_set(
                &key,
                || async move {
                    let report = self.user_bonuses(user_code, Some(year), Some(month)).await?;
                    Ok(QuickStats {
                        current_bonus: report.final_bonus,
                        current_deduction_percentage: report.deduction_percentage,
                        total_deductions: report.deduction_amount,
                        expires_in_days: report.expires_in_days,
                    })
                },
                Some(Duration::from_secs(ttl::SHORT)),
                CacheCategory::Bonuses,
            )
            .await
    }

    /// Drop every cached window for the user, e.g. after their records change
    pub async fn invalidate_user(&self, user_code: &str) -> u64 {
        self.cache.invalidate_user(user_code).await
    }

    async fn compute_report(
        &self,
        user_code: &str,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<BonusReport> {
        let today = today();
        let query_year = year.unwrap_or_else(|| today.year());
        let base = base_bonus_for_year(query_year);

        let (all_records, years, months) = futures::try_join!(
            self.source.records_for(user_code),
            self.source.active_years(user_code),
            self.source.active_months(user_code, query_year),
        )?;

        let available_years = if years.is_empty() {
            default_years(today)
        } else {
            years
        };
        let available_months = if months.is_empty() {
            default_months(query_year, today)
        } else {
            months
        };

        // A month without a year is ignored, matching the upstream API
        let window: Vec<&DeductionRecord> = match (year, month) {
            (Some(y), Some(m)) => all_records
                .iter()
                .filter(|record| overlaps_month(record, y, m, today))
                .collect(),
            (Some(y), None) => all_records
                .iter()
                .filter(|record| record.start_date.year() == y)
                .collect(),
            _ => all_records.iter().collect(),
        };

        let deductions = resolve_all(&window, base, today);
        let deduction_amount = deductions
            .iter()
            .map(|deduction| deduction.amount)
            .sum::<f64>()
            .min(base);
        let final_bonus = base - deduction_amount;
        let deduction_percentage = if base > 0.0 {
            ((deduction_amount / base) * 100.0).round()
        } else {
            0.0
        };

        let expires_in_days = expiration_days(&window, today);
        let bonuses_by_year = programmed_months_by_year(today);

        let mut monthly_bonus_data = None;
        let last_month_data = match (year, month) {
            (Some(y), Some(m)) => {
                let has_deductions = !window.is_empty();
                Some(MonthlyBonus {
                    year: y,
                    month: m,
                    month_name: month_name(m).to_string(),
                    bonus_value: base,
                    deduction_amount,
                    final_value: final_bonus,
                    has_deductions,
                    message: (!has_deductions).then(|| "No deductions - full bonus".to_string()),
                })
            }
            (Some(y), None) => {
                let mut months_out = Vec::with_capacity(12);
                for m in 1..=12 {
                    match compute_month(&all_records, y, m, base, today) {
                        Ok(outcome) => months_out.push(outcome),
                        Err(e) => {
                            error!(
                                year = y,
                                month = m,
                                error = %e,
                                "month computation failed, scoring zero executed"
                            );
                            months_out.push(MonthlyBonus {
                                year: y,
                                month: m,
                                month_name: month_name(m).to_string(),
                                bonus_value: base,
                                deduction_amount: base,
                                final_value: 0.0,
                                has_deductions: false,
                                message: None,
                            });
                        }
                    }
                }
                monthly_bonus_data = Some(months_out);
                last_month_snapshot(&window, today)
            }
            _ => last_month_snapshot(&window, today),
        };

        let (total_programmed, total_executed) = match &monthly_bonus_data {
            Some(list) => (
                list.iter().map(|m| m.bonus_value).sum(),
                list.iter().map(|m| m.final_value).sum(),
            ),
            None => (base, final_bonus),
        };
        let percentage = if total_programmed > 0.0 {
            round2(total_executed / total_programmed * 100.0)
        } else {
            0.0
        };

        Ok(BonusReport {
            base_bonus: base,
            deduction_percentage,
            deduction_amount,
            final_bonus,
            expires_in_days,
            bonuses_by_year,
            deductions,
            monthly_bonus_data,
            last_month_data,
            available_years,
            available_months,
            summary: BonusSummary {
                total_programmed,
                total_executed,
                percentage,
            },
        })
    }
}

// =============================================================================
// Window and Resolution Helpers
// =============================================================================

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// First and last day of a month
fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(Error::InvalidMonth(month))?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(Error::InvalidMonth(month))?;
    let last = next_first
        .pred_opt()
        .ok_or_else(|| Error::Internal("month underflow".into()))?;
    Ok((first, last))
}

/// Whether a record's date range touches the given month. A record overlaps
/// when its start falls in the month, its effective end (today for ongoing
/// records) falls in the month, or it spans the month entirely.
fn overlaps_month(record: &DeductionRecord, year: i32, month: u32, today: NaiveDate) -> bool {
    let Ok((month_start, month_end)) = month_bounds(year, month) else {
        return false;
    };

    let start = record.start_date;
    let effective_end = record.end_date.unwrap_or(today);

    let starts_in_month = start >= month_start && start <= month_end;
    let ends_in_month = effective_end >= month_start && effective_end <= month_end;
    let spans_month = start <= month_end && record.end_date.map_or(true, |end| end >= month_start);

    starts_in_month || ends_in_month || spans_month
}

/// Inclusive day span of a record; both endpoints count, ongoing records run
/// to today
fn inclusive_days(record: &DeductionRecord, today: NaiveDate) -> i64 {
    let end = record.end_date.unwrap_or(today);
    ((end - record.start_date).num_days() + 1).max(1)
}

/// Evaluate one record against the rule table. Unknown codes resolve to a
/// zero amount and are logged for operator visibility.
fn resolve_deduction(record: &DeductionRecord, base: f64, today: NaiveDate) -> ResolvedDeduction {
    let days = inclusive_days(record, today);

    let (label, amount) = match record.code.rule() {
        Some(rule) => {
            let amount = match rule.penalty {
                Penalty::Percentage(fraction) => base * fraction,
                Penalty::PerDay(rate) => rate * days as f64,
            };
            (rule.label.to_string(), amount)
        }
        None => {
            warn!(
                code = %record.code,
                employee = %record.employee_code,
                "unrecognized deduction code, resolving to zero"
            );
            (
                format!("Unrecognized deduction code: {}", record.code),
                0.0,
            )
        }
    };

    ResolvedDeduction {
        code: record.code.as_str().to_string(),
        label,
        start_date: record.start_date,
        end_date: record.end_date,
        days,
        amount,
        notes: record.notes.clone(),
    }
}

fn resolve_all(records: &[&DeductionRecord], base: f64, today: NaiveDate) -> Vec<ResolvedDeduction> {
    records
        .iter()
        .map(|record| resolve_deduction(record, base, today))
        .collect()
}

/// One month of a year sweep, computed independently of the others
fn compute_month(
    records: &[DeductionRecord],
    year: i32,
    month: u32,
    base: f64,
    today: NaiveDate,
) -> Result<MonthlyBonus> {
    month_bounds(year, month)?;

    let overlapping: Vec<&DeductionRecord> = records
        .iter()
        .filter(|record| overlaps_month(record, year, month, today))
        .collect();

    let resolved = resolve_all(&overlapping, base, today);
    let deduction_amount = resolved
        .iter()
        .map(|deduction| deduction.amount)
        .sum::<f64>()
        .min(base);

    Ok(MonthlyBonus {
        year,
        month,
        month_name: month_name(month).to_string(),
        bonus_value: base,
        deduction_amount,
        final_value: base - deduction_amount,
        has_deductions: !overlapping.is_empty(),
        message: None,
    })
}

/// Snapshot of the most recent month with any record in the window. Records
/// are attributed to the month they start in.
fn last_month_snapshot(window: &[&DeductionRecord], today: NaiveDate) -> Option<MonthlyBonus> {
    let latest = window.iter().max_by_key(|record| record.start_date)?;
    let (year, month) = (latest.start_date.year(), latest.start_date.month());
    let base = base_bonus_for_year(year);

    let in_month: Vec<&DeductionRecord> = window
        .iter()
        .filter(|record| {
            record.start_date.year() == year && record.start_date.month() == month
        })
        .copied()
        .collect();

    let resolved = resolve_all(&in_month, base, today);
    let deduction_amount = resolved
        .iter()
        .map(|deduction| deduction.amount)
        .sum::<f64>()
        .min(base);

    Some(MonthlyBonus {
        year,
        month,
        month_name: month_name(month).to_string(),
        bonus_value: base,
        deduction_amount,
        final_value: base - deduction_amount,
        has_deductions: !in_month.is_empty(),
        message: None,
    })
}

/// Days until the newest novelty stops affecting the bonus, floored at zero
fn expiration_days(window: &[&DeductionRecord], today: NaiveDate) -> Option<i64> {
    let latest = window.iter().map(|record| record.start_date).max()?;
    let expires = latest.checked_add_days(Days::new(NOVELTY_EFFECT_DAYS))?;
    Some((expires - today).num_days().max(0))
}

/// The current year and the five before it, newest first
fn default_years(today: NaiveDate) -> Vec<i32> {
    (0..6).map(|offset| today.year() - offset).collect()
}

/// Months to offer when the source has no activity for the year
fn default_months(target_year: i32, today: NaiveDate) -> Vec<u32> {
    if target_year == today.year() {
        (1..=today.month()).collect()
    } else if target_year < today.year() {
        (1..=12).collect()
    } else {
        Vec::new()
    }
}

/// Programmed bonus months per tracked year; the current year counts only
/// the elapsed months
fn programmed_months_by_year(today: NaiveDate) -> BTreeMap<i32, u32> {
    (FIRST_TRACKED_YEAR..=today.year())
        .map(|year| {
            let months = if year == today.year() {
                today.month()
            } else {
                12
            };
            (year, months)
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonus::rules::DeductionCode;
    use crate::bonus::source::InMemoryDeductionSource;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(code: &str, start: NaiveDate, end: Option<NaiveDate>) -> DeductionRecord {
        DeductionRecord::try_new("E001", DeductionCode::parse(code), start, end, None).unwrap()
    }

    fn calculator(source: InMemoryDeductionSource) -> BonusCalculator {
        BonusCalculator::new(Arc::new(source), Arc::new(HybridCache::in_memory()))
    }

    // -------------------------------------------------------------------------
    // Helper behavior
    // -------------------------------------------------------------------------

    #[test]
    fn test_month_bounds() {
        let (first, last) = month_bounds(2025, 6).unwrap();
        assert_eq!(first, date(2025, 6, 1));
        assert_eq!(last, date(2025, 6, 30));

        let (first, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(first, date(2024, 2, 1));
        assert_eq!(last, date(2024, 2, 29));

        let (_, last) = month_bounds(2025, 12).unwrap();
        assert_eq!(last, date(2025, 12, 31));

        assert!(month_bounds(2025, 13).is_err());
    }

    #[test]
    fn test_boundary_record_overlaps_both_months() {
        let today = date(2025, 6, 15);
        let spanning = record("7", date(2025, 1, 28), Some(date(2025, 2, 3)));

        assert!(overlaps_month(&spanning, 2025, 1, today));
        assert!(overlaps_month(&spanning, 2025, 2, today));
        assert!(!overlaps_month(&spanning, 2025, 3, today));
    }

    #[test]
    fn test_record_spanning_whole_month_overlaps() {
        let today = date(2025, 6, 15);
        let long = record("3", date(2025, 1, 10), Some(date(2025, 4, 20)));

        // February and March are wholly inside the span
        assert!(overlaps_month(&long, 2025, 2, today));
        assert!(overlaps_month(&long, 2025, 3, today));
        assert!(!overlaps_month(&long, 2025, 5, today));
    }

    #[test]
    fn test_ongoing_record_overlaps_through_today() {
        let today = date(2025, 6, 15);
        let ongoing = record("8", date(2025, 4, 1), None);

        assert!(overlaps_month(&ongoing, 2025, 4, today));
        assert!(overlaps_month(&ongoing, 2025, 5, today));
        assert!(overlaps_month(&ongoing, 2025, 6, today));
        // Unbounded end also satisfies the spanning clause for later months
        assert!(overlaps_month(&ongoing, 2025, 7, today));
        assert!(!overlaps_month(&ongoing, 2025, 3, today));
    }

    #[test]
    fn test_inclusive_day_count() {
        let today = date(2025, 6, 15);

        let single = record("7", date(2025, 6, 10), Some(date(2025, 6, 10)));
        assert_eq!(inclusive_days(&single, today), 1);

        let three = record("7", date(2025, 6, 10), Some(date(2025, 6, 12)));
        assert_eq!(inclusive_days(&three, today), 3);

        let ongoing = record("7", date(2025, 6, 13), None);
        assert_eq!(inclusive_days(&ongoing, today), 3);
    }

    #[test]
    fn test_resolve_percentage_rule() {
        let today = date(2025, 6, 15);
        let leave = record("1", date(2025, 6, 2), Some(date(2025, 6, 4)));

        let resolved = resolve_deduction(&leave, 142_000.0, today);
        assert_eq!(resolved.amount, 35_500.0);
        assert_eq!(resolved.label, "Medical leave");
        assert_eq!(resolved.days, 3);
    }

    #[test]
    fn test_resolve_per_day_rule() {
        let today = date(2025, 6, 15);
        let suspension = record("8", date(2025, 6, 10), Some(date(2025, 6, 12)));

        let resolved = resolve_deduction(&suspension, 142_000.0, today);
        assert_eq!(resolved.days, 3);
        assert_eq!(resolved.amount, 14_199.0);
    }

    #[test]
    fn test_resolve_unknown_code_is_zero() {
        let today = date(2025, 6, 15);
        let unknown = record("NPD", date(2025, 6, 1), Some(date(2025, 6, 2)));

        let resolved = resolve_deduction(&unknown, 142_000.0, today);
        assert_eq!(resolved.amount, 0.0);
        assert_eq!(resolved.code, "NPD");
        assert!(resolved.label.contains("NPD"));
    }

    #[test]
    fn test_compute_month_caps_deduction() {
        let today = date(2025, 6, 15);
        let records = vec![
            record("2", date(2025, 6, 2), Some(date(2025, 6, 2))),
            record("10", date(2025, 6, 9), Some(date(2025, 6, 9))),
        ];

        let outcome = compute_month(&records, 2025, 6, 142_000.0, today).unwrap();
        assert_eq!(outcome.deduction_amount, 142_000.0);
        assert_eq!(outcome.final_value, 0.0);
        assert!(outcome.has_deductions);
    }

    #[test]
    fn test_non_performance_rule_still_flags_month() {
        let today = date(2025, 6, 15);
        // Vacation does not affect performance but the month is still flagged
        let records = vec![record("7", date(2025, 6, 2), Some(date(2025, 6, 6)))];

        let outcome = compute_month(&records, 2025, 6, 142_000.0, today).unwrap();
        assert!(outcome.has_deductions);
        assert!(outcome.deduction_amount > 0.0);
    }

    proptest! {
        /// For any mix of records the deduction stays within [0, base] and
        /// the final bonus never goes negative
        #[test]
        fn prop_cap_invariant(
            cases in proptest::collection::vec(
                (0usize..28, 1u32..=28, 0u32..10),
                0..12,
            )
        ) {
            const CODES: [&str; 28] = [
                "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11",
                "12", "13", "DL", "DG", "DGV", "DEL", "DEG", "DEGV", "INT",
                "OM", "OMD", "OG", "NPF", "HCC-L", "HCC-G", "HCC-GV",
            ];

            let today = date(2025, 6, 15);
            let base = 142_000.0;
            let records: Vec<DeductionRecord> = cases
                .into_iter()
                .map(|(code_idx, start_day, span)| {
                    let start = date(2025, 6, start_day);
                    let end = start.checked_add_days(Days::new(span as u64)).unwrap();
                    record(CODES[code_idx], start, Some(end))
                })
                .collect();

            let outcome = compute_month(&records, 2025, 6, base, today).unwrap();
            prop_assert!(outcome.deduction_amount >= 0.0);
            prop_assert!(outcome.deduction_amount <= base);
            prop_assert!(outcome.final_value >= 0.0);
            prop_assert!((outcome.final_value + outcome.deduction_amount - base).abs() < 1e-9);
        }
    }

    // -------------------------------------------------------------------------
    // End-to-end report behavior
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_single_percentage_rule_report() {
        let source = InMemoryDeductionSource::with_records(vec![record(
            "1",
            date(2025, 6, 2),
            Some(date(2025, 6, 4)),
        )]);
        let calc = calculator(source);

        let report = calc.user_bonuses("E001", Some(2025), Some(6)).await.unwrap();
        assert_eq!(report.base_bonus, 142_000.0);
        assert_eq!(report.deduction_amount, 35_500.0);
        assert_eq!(report.final_bonus, 106_500.0);
        assert_eq!(report.deduction_percentage, 25.0);
        assert_eq!(report.summary.percentage, 75.0);
        assert_eq!(report.deductions.len(), 1);

        let snapshot = report.last_month_data.unwrap();
        assert!(snapshot.has_deductions);
        assert!(snapshot.message.is_none());
    }

    #[tokio::test]
    async fn test_per_day_rule_report() {
        let source = InMemoryDeductionSource::with_records(vec![record(
            "8",
            date(2025, 6, 10),
            Some(date(2025, 6, 12)),
        )]);
        let calc = calculator(source);

        let report = calc.user_bonuses("E001", Some(2025), Some(6)).await.unwrap();
        assert_eq!(report.deductions[0].days, 3);
        assert_eq!(report.deduction_amount, 14_199.0);
        assert_eq!(report.final_bonus, 142_000.0 - 14_199.0);
    }

    #[tokio::test]
    async fn test_deductions_capped_at_base() {
        // Two full-percentage rules sum past the base
        let source = InMemoryDeductionSource::with_records(vec![
            record("2", date(2025, 6, 2), Some(date(2025, 6, 2))),
            record("DL", date(2025, 6, 5), Some(date(2025, 6, 5))),
            record("10", date(2025, 6, 9), Some(date(2025, 6, 9))),
        ]);
        let calc = calculator(source);

        let report = calc.user_bonuses("E001", Some(2025), Some(6)).await.unwrap();
        assert_eq!(report.deduction_amount, 142_000.0);
        assert_eq!(report.final_bonus, 0.0);
        assert_eq!(report.deduction_percentage, 100.0);
        assert_eq!(report.summary.percentage, 0.0);
    }

    #[tokio::test]
    async fn test_clean_month_reports_full_bonus() {
        let calc = calculator(InMemoryDeductionSource::new());

        let report = calc.user_bonuses("E001", Some(2025), Some(3)).await.unwrap();
        assert_eq!(report.deduction_amount, 0.0);
        assert_eq!(report.final_bonus, report.base_bonus);
        assert_eq!(report.summary.percentage, 100.0);

        let snapshot = report.last_month_data.unwrap();
        assert!(!snapshot.has_deductions);
        assert_eq!(
            snapshot.message.as_deref(),
            Some("No deductions - full bonus")
        );
    }

    #[tokio::test]
    async fn test_year_sweep_counts_boundary_record_in_both_months() {
        let source = InMemoryDeductionSource::with_records(vec![record(
            "7",
            date(2025, 1, 28),
            Some(date(2025, 2, 3)),
        )]);
        let calc = calculator(source);

        let report = calc.user_bonuses("E001", Some(2025), None).await.unwrap();
        let months = report.monthly_bonus_data.unwrap();
        assert_eq!(months.len(), 12);

        assert!(months[0].has_deductions);
        assert!(months[1].has_deductions);
        assert!(!months[2].has_deductions);

        // The full 7-day span is charged in each month the record touches
        assert_eq!(months[0].deduction_amount, 7.0 * 4733.0);
        assert_eq!(months[1].deduction_amount, 7.0 * 4733.0);
    }

    #[tokio::test]
    async fn test_year_summary_aggregates_twelve_months() {
        let source = InMemoryDeductionSource::with_records(vec![record(
            "2",
            date(2025, 6, 2),
            Some(date(2025, 6, 2)),
        )]);
        let calc = calculator(source);

        let report = calc.user_bonuses("E001", Some(2025), None).await.unwrap();
        assert_eq!(report.summary.total_programmed, 12.0 * 142_000.0);
        assert_eq!(report.summary.total_executed, 11.0 * 142_000.0);
        assert_eq!(report.summary.percentage, round2(11.0 / 12.0 * 100.0));

        let snapshot = report.last_month_data.unwrap();
        assert_eq!(snapshot.month, 6);
        assert_eq!(snapshot.final_value, 0.0);
    }

    #[tokio::test]
    async fn test_earlier_year_uses_its_base() {
        let source = InMemoryDeductionSource::with_records(vec![record(
            "1",
            date(2023, 4, 3),
            Some(date(2023, 4, 5)),
        )]);
        let calc = calculator(source);

        let report = calc.user_bonuses("E001", Some(2023), Some(4)).await.unwrap();
        assert_eq!(report.base_bonus, 128_000.0);
        assert_eq!(report.deduction_amount, 32_000.0);
    }

    #[tokio::test]
    async fn test_report_served_from_cache() {
        let source = Arc::new(InMemoryDeductionSource::with_records(vec![record(
            "1",
            date(2025, 6, 2),
            Some(date(2025, 6, 4)),
        )]));
        let calc = BonusCalculator::new(source.clone(), Arc::new(HybridCache::in_memory()));

        let first = calc.user_bonuses("E001", Some(2025), Some(6)).await.unwrap();
        let fetches_after_first = source.fetches();

        let second = calc.user_bonuses("E001", Some(2025), Some(6)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.fetches(), fetches_after_first);
    }

    #[tokio::test]
    async fn test_invalidation_forces_recompute() {
        let source = Arc::new(InMemoryDeductionSource::with_records(vec![record(
            "1",
            date(2025, 6, 2),
            Some(date(2025, 6, 4)),
        )]));
        let calc = BonusCalculator::new(source.clone(), Arc::new(HybridCache::in_memory()));

        calc.user_bonuses("E001", Some(2025), Some(6)).await.unwrap();
        let fetches_after_first = source.fetches();

        calc.invalidate_user("E001").await;
        calc.user_bonuses("E001", Some(2025), Some(6)).await.unwrap();
        assert!(source.fetches() > fetches_after_first);
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates_uncached() {
        let source = Arc::new(InMemoryDeductionSource::new());
        source.set_failing(true);
        let cache = Arc::new(HybridCache::in_memory());
        let calc = BonusCalculator::new(source.clone(), cache.clone());

        let result = calc.user_bonuses("E001", Some(2025), Some(6)).await;
        assert!(matches!(result, Err(Error::Upstream(_))));
        assert!(!cache.exists("bonuses:E001:2025:6").await);

        // Once the source recovers, the same call succeeds
        source.set_failing(false);
        assert!(calc.user_bonuses("E001", Some(2025), Some(6)).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_month_rejected() {
        let calc = calculator(InMemoryDeductionSource::new());
        let result = calc.user_bonuses("E001", Some(2025), Some(13)).await;
        assert!(matches!(result, Err(Error::InvalidMonth(13))));
    }

    #[tokio::test]
    async fn test_defaults_when_source_is_empty() {
        let calc = calculator(InMemoryDeductionSource::new());

        let report = calc.user_bonuses("E001", Some(2025), Some(6)).await.unwrap();
        assert_eq!(report.available_years.len(), 6);
        assert!(report.expires_in_days.is_none());
        assert!(!report.bonuses_by_year.is_empty());
    }

    #[tokio::test]
    async fn test_quick_stats_cached() {
        let source = Arc::new(InMemoryDeductionSource::new());
        let calc = BonusCalculator::new(source.clone(), Arc::new(HybridCache::in_memory()));

        let first = calc.quick_stats("E001").await.unwrap();
        let fetches_after_first = source.fetches();

        let second = calc.quick_stats("E001").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.fetches(), fetches_after_first);
        assert_eq!(first.current_deduction_percentage, 0.0);
    }
}
