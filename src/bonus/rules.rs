//! Deduction Rule Table
//!
//! Static mapping from novelty codes to penalties. Every code known to the
//! payroll area maps to exactly one rule; codes outside the table parse into
//! [`DeductionCode::Unknown`] and resolve to a zero amount downstream instead
//! of failing the calculation.
//!
//! The numeric codes come straight from the upstream novelty table; the
//! lettered ones are damage/disincentive/conduct incident classes.
//!
//! Known divergence: the profile display elsewhere lists `NPD` where this
//! table carries `NPF`. Kept as-is pending a call from the payroll area.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Currency deducted per calendar day for day-based rules
pub const PER_DAY_RATE: f64 = 4733.0;

/// Base bonus per calendar year
static BONUS_BASE_BY_YEAR: Lazy<BTreeMap<i32, f64>> = Lazy::new(|| {
    BTreeMap::from([
        (2020, 122_000.0),
        (2021, 122_000.0),
        (2022, 122_000.0),
        (2023, 128_000.0),
        (2024, 135_000.0),
        (2025, 142_000.0),
    ])
});

/// Base bonus for a year; unmapped years fall back to the earliest defined
/// base
pub fn base_bonus_for_year(year: i32) -> f64 {
    BONUS_BASE_BY_YEAR.get(&year).copied().unwrap_or_else(|| {
        BONUS_BASE_BY_YEAR
            .values()
            .next()
            .copied()
            .unwrap_or_default()
    })
}

/// How a rule reduces the base bonus
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Penalty {
    /// Fraction of the base bonus
    Percentage(f64),
    /// Fixed currency amount per calendar day of the record's span
    PerDay(f64),
}

/// One static rule definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeductionRule {
    /// Operator-facing description
    pub label: &'static str,
    /// Penalty applied per overlapping record
    pub penalty: Penalty,
    /// Whether the novelty counts against the operator's performance
    pub affects_performance: bool,
}

/// Novelty code, closed over every code the rule table knows plus an
/// explicit `Unknown` variant for everything else
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeductionCode {
    NoDeduction,
    MedicalLeave,
    Absenteeism,
    ExtendedMedicalLeave,
    Calamity,
    Tardiness,
    Resignation,
    Vacation,
    Suspension,
    NoEntry,
    Restriction,
    UnpaidDay,
    HourlyTardiness,
    UnpaidHours,
    MinorDamage,
    SeriousDamage,
    CriticalDamage,
    MinorDisincentive,
    SeriousDisincentive,
    CriticalDisincentive,
    InternalBreach,
    MinorInfraction,
    ModerateInfraction,
    SeriousInfraction,
    TrainingNoShow,
    ConductMinor,
    ConductSerious,
    ConductCritical,
    /// Code absent from the rule table; resolves to a zero amount
    Unknown(String),
}

impl DeductionCode {
    /// Parse an upstream code. Never fails: unrecognized codes become
    /// [`DeductionCode::Unknown`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "0" => Self::NoDeduction,
            "1" => Self::MedicalLeave,
            "2" => Self::Absenteeism,
            "3" => Self::ExtendedMedicalLeave,
            "4" => Self::Calamity,
            "5" => Self::Tardiness,
            "6" => Self::Resignation,
            "7" => Self::Vacation,
            "8" => Self::Suspension,
            "9" => Self::NoEntry,
            "10" => Self::Restriction,
            "11" => Self::UnpaidDay,
            "12" => Self::HourlyTardiness,
            "13" => Self::UnpaidHours,
            "DL" => Self::MinorDamage,
            "DG" => Self::SeriousDamage,
            "DGV" => Self::CriticalDamage,
            "DEL" => Self::MinorDisincentive,
            "DEG" => Self::SeriousDisincentive,
            "DEGV" => Self::CriticalDisincentive,
            "INT" => Self::InternalBreach,
            "OM" => Self::MinorInfraction,
            "OMD" => Self::ModerateInfraction,
            "OG" => Self::SeriousInfraction,
            "NPF" => Self::TrainingNoShow,
            "HCC-L" => Self::ConductMinor,
            "HCC-G" => Self::ConductSerious,
            "HCC-GV" => Self::ConductCritical,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The wire form of the code
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoDeduction => "0",
            Self::MedicalLeave => "1",
            Self::Absenteeism => "2",
            Self::ExtendedMedicalLeave => "3",
            Self::Calamity => "4",
            Self::Tardiness => "5",
            Self::Resignation => "6",
            Self::Vacation => "7",
            Self::Suspension => "8",
            Self::NoEntry => "9",
            Self::Restriction => "10",
            Self::UnpaidDay => "11",
            Self::HourlyTardiness => "12",
            Self::UnpaidHours => "13",
            Self::MinorDamage => "DL",
            Self::SeriousDamage => "DG",
            Self::CriticalDamage => "DGV",
            Self::MinorDisincentive => "DEL",
            Self::SeriousDisincentive => "DEG",
            Self::CriticalDisincentive => "DEGV",
            Self::InternalBreach => "INT",
            Self::MinorInfraction => "OM",
            Self::ModerateInfraction => "OMD",
            Self::SeriousInfraction => "OG",
            Self::TrainingNoShow => "NPF",
            Self::ConductMinor => "HCC-L",
            Self::ConductSerious => "HCC-G",
            Self::ConductCritical => "HCC-GV",
            Self::Unknown(code) => code,
        }
    }

    /// The rule for this code, None for [`DeductionCode::Unknown`]
    pub fn rule(&self) -> Option<DeductionRule> {
        let rule = match self {
            Self::NoDeduction => DeductionRule {
                label: "No deduction",
                penalty: Penalty::Percentage(0.0),
                affects_performance: false,
            },
            Self::MedicalLeave => DeductionRule {
                label: "Medical leave",
                penalty: Penalty::Percentage(0.25),
                affects_performance: true,
            },
            Self::Absenteeism => DeductionRule {
                label: "Absenteeism",
                penalty: Penalty::Percentage(1.0),
                affects_performance: true,
            },
            Self::ExtendedMedicalLeave => DeductionRule {
                label: "Medical leave over 7 days",
                penalty: Penalty::PerDay(PER_DAY_RATE),
                affects_performance: true,
            },
            Self::Calamity => DeductionRule {
                label: "Domestic calamity",
                penalty: Penalty::PerDay(PER_DAY_RATE),
                affects_performance: false,
            },
            Self::Tardiness => DeductionRule {
                label: "Tardiness",
                penalty: Penalty::Percentage(0.25),
                affects_performance: true,
            },
            Self::Resignation => DeductionRule {
                label: "Resignation",
                penalty: Penalty::PerDay(PER_DAY_RATE),
                affects_performance: true,
            },
            Self::Vacation => DeductionRule {
                label: "Vacation",
                penalty: Penalty::PerDay(PER_DAY_RATE),
                affects_performance: false,
            },
            Self::Suspension => DeductionRule {
                label: "Suspension",
                penalty: Penalty::PerDay(PER_DAY_RATE),
                affects_performance: true,
            },
            Self::NoEntry => DeductionRule {
                label: "Did not report for duty",
                penalty: Penalty::PerDay(PER_DAY_RATE),
                affects_performance: false,
            },
            Self::Restriction => DeductionRule {
                label: "Duty restriction",
                penalty: Penalty::Percentage(1.0),
                affects_performance: true,
            },
            Self::UnpaidDay => DeductionRule {
                label: "Unpaid day",
                penalty: Penalty::PerDay(PER_DAY_RATE),
                affects_performance: false,
            },
            Self::HourlyTardiness => DeductionRule {
                label: "Tardiness by hours",
                penalty: Penalty::Percentage(0.5),
                affects_performance: true,
            },
            Self::UnpaidHours => DeductionRule {
                label: "Unpaid hours",
                penalty: Penalty::Percentage(0.0),
                affects_performance: false,
            },
            Self::MinorDamage => DeductionRule {
                label: "Minor damage",
                penalty: Penalty::Percentage(0.25),
                affects_performance: true,
            },
            Self::SeriousDamage => DeductionRule {
                label: "Serious damage",
                penalty: Penalty::Percentage(0.5),
                affects_performance: true,
            },
            Self::CriticalDamage => DeductionRule {
                label: "Critical damage",
                penalty: Penalty::Percentage(1.0),
                affects_performance: true,
            },
            Self::MinorDisincentive => DeductionRule {
                label: "Minor disincentive",
                penalty: Penalty::Percentage(0.25),
                affects_performance: true,
            },
            Self::SeriousDisincentive => DeductionRule {
                label: "Serious disincentive",
                penalty: Penalty::Percentage(0.5),
                affects_performance: true,
            },
            Self::CriticalDisincentive => DeductionRule {
                label: "Critical disincentive",
                penalty: Penalty::Percentage(1.0),
                affects_performance: true,
            },
            Self::InternalBreach => DeductionRule {
                label: "Internal non-compliance",
                penalty: Penalty::Percentage(0.25),
                affects_performance: true,
            },
            Self::MinorInfraction => DeductionRule {
                label: "Minor infraction",
                penalty: Penalty::Percentage(0.25),
                affects_performance: true,
            },
            Self::ModerateInfraction => DeductionRule {
                label: "Moderate infraction",
                penalty: Penalty::Percentage(0.5),
                affects_performance: true,
            },
            Self::SeriousInfraction => DeductionRule {
                label: "Serious infraction",
                penalty: Penalty::Percentage(1.0),
                affects_performance: true,
            },
            Self::TrainingNoShow => DeductionRule {
                label: "Failure to attend training",
                penalty: Penalty::Percentage(1.0),
                affects_performance: true,
            },
            Self::ConductMinor => DeductionRule {
                label: "Habits and conduct - minor",
                penalty: Penalty::Percentage(0.25),
                affects_performance: true,
            },
            Self::ConductSerious => DeductionRule {
                label: "Habits and conduct - serious",
                penalty: Penalty::Percentage(0.5),
                affects_performance: true,
            },
            Self::ConductCritical => DeductionRule {
                label: "Habits and conduct - critical",
                penalty: Penalty::Percentage(1.0),
                affects_performance: true,
            },
            Self::Unknown(_) => return None,
        };
        Some(rule)
    }
}

impl std::fmt::Display for DeductionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for DeductionCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeductionCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

// =============================================================================
// Tests
// =============================================================================
