//! Half-day rounding and hour-to-day conversion for request amounts.

use chrono::NaiveDate;
use core_types::Days;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

pub const HALF_DAY_STEP: Days = 0.5;
const HALF_DAY_HOURS: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    Floor,
    Round,
    Ceil,
}

/// Unit a request is filed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveUnit {
    Day,
    Hour,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum RoundingRule {
    Day { mode: RoundingMode },
    Hour { mode: RoundingMode },
}

impl RoundingRule {
    pub fn mode(&self) -> RoundingMode {
        match self {
            RoundingRule::Day { mode } | RoundingRule::Hour { mode } => *mode,
        }
    }
}

/// Snap `value` onto the half-day grid using the rule's mode.
pub fn apply_rounding(value: Days, rule: &RoundingRule) -> Days {
    let steps = value / HALF_DAY_STEP;
    let steps = match rule.mode() {
        RoundingMode::Floor => steps.floor(),
        RoundingMode::Ceil => steps.ceil(),
        RoundingMode::Round => steps.round(),
    };
    steps * HALF_DAY_STEP
}

/// Convert an hour-unit request into days. Anything up to four hours counts
/// as a half day; longer spans round onto the half-day grid.
pub fn time_to_days(minutes: f64, hours_per_day: f64, rule: &RoundingRule) -> Days {
    let hours = minutes / 60.0;
    if hours <= HALF_DAY_HOURS {
        return HALF_DAY_STEP;
    }
    apply_rounding(hours / hours_per_day, rule)
}

/// Day count of a request span, never below one day.
pub fn span_days(start: NaiveDate, end: NaiveDate) -> Days {
    let days = (end - start).num_days().max(0) as Days;
    days.max(1.0)
}

/// Total half-day amount for a request, honoring its unit and the policy
/// rounding rule. Hour-unit requests need the employee's contracted hours.
pub fn request_total_days(
    start: NaiveDate,
    end: NaiveDate,
    unit: LeaveUnit,
    hours_per_day: Option<f64>,
    rule: &RoundingRule,
) -> Result<Days> {
    match unit {
        LeaveUnit::Hour => {
            let hours_per_day = hours_per_day.ok_or(LedgerError::MissingHoursPerDay)?;
            let minutes = (end - start).num_minutes().max(0) as f64;
            Ok(time_to_days(minutes, hours_per_day, rule))
        }
        LeaveUnit::Day => Ok(apply_rounding(span_days(start, end), rule)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rounding_modes_snap_to_half_days() {
        let floor = RoundingRule::Day {
            mode: RoundingMode::Floor,
        };
        let ceil = RoundingRule::Day {
            mode: RoundingMode::Ceil,
        };
        let round = RoundingRule::Day {
            mode: RoundingMode::Round,
        };
        assert_eq!(apply_rounding(1.3, &floor), 1.0);
        assert_eq!(apply_rounding(1.3, &ceil), 1.5);
        assert_eq!(apply_rounding(1.3, &round), 1.5);
        assert_eq!(apply_rounding(1.2, &round), 1.0);
        assert_eq!(apply_rounding(2.0, &floor), 2.0);
    }

    #[test]
    fn short_hour_requests_count_half_a_day() {
        let rule = RoundingRule::Hour {
            mode: RoundingMode::Round,
        };
        assert_eq!(time_to_days(120.0, 8.0, &rule), 0.5);
        assert_eq!(time_to_days(240.0, 8.0, &rule), 0.5);
        assert_eq!(time_to_days(360.0, 8.0, &rule), 1.0);
        assert_eq!(time_to_days(480.0, 8.0, &rule), 1.0);
    }

    #[test]
    fn spans_count_at_least_one_day() {
        assert_eq!(span_days(date(2025, 3, 10), date(2025, 3, 10)), 1.0);
        assert_eq!(span_days(date(2025, 3, 10), date(2025, 3, 12)), 2.0);
        assert_eq!(span_days(date(2025, 3, 12), date(2025, 3, 10)), 1.0);
    }

    #[test]
    fn hour_unit_requires_contracted_hours() {
        let rule = RoundingRule::Hour {
            mode: RoundingMode::Round,
        };
        let err = request_total_days(
            date(2025, 3, 10),
            date(2025, 3, 10),
            LeaveUnit::Hour,
            None,
            &rule,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::MissingHoursPerDay));
    }
}
