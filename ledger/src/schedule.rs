//! Grant-date schedule math: tenure buckets and anchor enumeration.

use chrono::{Datelike, NaiveDate};

use crate::policy::{BaselineRule, PolicyConfig};

/// Calendar-month difference. Day-of-month does not participate, so grant
/// dates whose day was clamped by a short month stay in their intended
/// tenure bucket.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}

/// Service length at `as_of`, floored to the nearest half year. This is the
/// key the grant tables are looked up with.
pub fn tenure_years(join: NaiveDate, as_of: NaiveDate) -> f64 {
    let months = months_between(join, as_of);
    if months <= 0 {
        return 0.0;
    }
    (months / 6) as f64 / 2.0
}

/// Month shift with the day clamped to the end of shorter months.
pub fn add_months(date: NaiveDate, delta: i32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + delta;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    clamped_ymd(year, month, date.day())
}

pub fn add_years(date: NaiveDate, years: i32) -> NaiveDate {
    add_months(date, years * 12)
}

fn clamped_ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    let mut day = day;
    loop {
        if let Some(candidate) = NaiveDate::from_ymd_opt(year, month, day) {
            return candidate;
        }
        day -= 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrantAnchor {
    pub grant_date: NaiveDate,
    pub tenure_years: f64,
}

/// Every grant date from the employee's first up to `until` inclusive.
pub fn anchors(join: NaiveDate, policy: &PolicyConfig, until: NaiveDate) -> Vec<GrantAnchor> {
    let mut out = Vec::new();
    match policy.baseline {
        BaselineRule::RelativeFromJoin {
            initial_offset_months,
        } => {
            let mut cursor = add_months(join, initial_offset_months as i32);
            while cursor <= until {
                out.push(anchor(join, cursor));
                if policy.grant_cycle_months == 0 {
                    break;
                }
                cursor = add_months(cursor, policy.grant_cycle_months as i32);
            }
        }
        BaselineRule::Anniversary { offset_months } => {
            for year in join.year().. {
                let anniversary = clamped_ymd(year, join.month(), join.day());
                let base = add_months(anniversary, offset_months as i32);
                if base > until {
                    break;
                }
                out.push(anchor(join, base));
            }
        }
        BaselineRule::FixedMonthDay { month, day } => {
            for year in join.year().. {
                let base = clamped_ymd(year, month, day);
                if base < join {
                    continue;
                }
                if base > until {
                    break;
                }
                out.push(anchor(join, base));
            }
        }
    }
    out
}

fn anchor(join: NaiveDate, grant_date: NaiveDate) -> GrantAnchor {
    GrantAnchor {
        grant_date,
        tenure_years: tenure_years(join, grant_date),
    }
}

/// First grant date strictly after `as_of`. `None` only when the policy
/// defines no cycle and the initial grant already passed.
pub fn next_grant_date(join: NaiveDate, policy: &PolicyConfig, as_of: NaiveDate) -> Option<NaiveDate> {
    match policy.baseline {
        BaselineRule::RelativeFromJoin {
            initial_offset_months,
        } => {
            let mut cursor = add_months(join, initial_offset_months as i32);
            while cursor <= as_of {
                if policy.grant_cycle_months == 0 {
                    return None;
                }
                cursor = add_months(cursor, policy.grant_cycle_months as i32);
            }
            Some(cursor)
        }
        BaselineRule::Anniversary { offset_months } => (join.year()..).find_map(|year| {
            let base = add_months(clamped_ymd(year, join.month(), join.day()), offset_months as i32);
            (base > as_of).then_some(base)
        }),
        BaselineRule::FixedMonthDay { month, day } => (join.year()..).find_map(|year| {
            let base = clamped_ymd(year, month, day);
            (base > as_of && base >= join).then_some(base)
        }),
    }
}

/// Most recent grant date on or before `as_of`, if any.
pub fn previous_grant_date(
    join: NaiveDate,
    policy: &PolicyConfig,
    as_of: NaiveDate,
) -> Option<NaiveDate> {
    anchors(join, policy, as_of).last().map(|a| a.grant_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyConfig;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn relative_policy(offset: u32, cycle: u32) -> PolicyConfig {
        let mut policy = PolicyConfig::built_in();
        policy.baseline = BaselineRule::RelativeFromJoin {
            initial_offset_months: offset,
        };
        policy.grant_cycle_months = cycle;
        policy
    }

    #[test]
    fn tenure_floors_to_half_years() {
        let join = date(2023, 2, 2);
        assert_eq!(tenure_years(join, date(2023, 8, 2)), 0.5);
        assert_eq!(tenure_years(join, date(2024, 8, 2)), 1.5);
        assert_eq!(tenure_years(join, date(2026, 8, 2)), 3.5);
        assert_eq!(tenure_years(join, date(2023, 7, 2)), 0.0);
        assert_eq!(tenure_years(join, date(2022, 8, 2)), 0.0);
    }

    #[test]
    fn month_shift_clamps_short_months() {
        assert_eq!(add_months(date(2023, 1, 31), 1), date(2023, 2, 28));
        assert_eq!(add_months(date(2023, 8, 31), 6), date(2024, 2, 29));
        assert_eq!(add_months(date(2023, 3, 15), -3), date(2022, 12, 15));
        assert_eq!(add_years(date(2024, 2, 29), 1), date(2025, 2, 28));
    }

    #[test]
    fn relative_anchors_follow_offset_and_cycle() {
        let policy = relative_policy(6, 12);
        let join = date(2023, 2, 2);
        let anchors = anchors(join, &policy, date(2024, 8, 2));
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].grant_date, date(2023, 8, 2));
        assert_eq!(anchors[0].tenure_years, 0.5);
        assert_eq!(anchors[1].grant_date, date(2024, 8, 2));
        assert_eq!(anchors[1].tenure_years, 1.5);
    }

    #[test]
    fn anniversary_anchors_land_on_join_day() {
        let mut policy = PolicyConfig::built_in();
        policy.baseline = BaselineRule::Anniversary { offset_months: 1 };
        let join = date(2023, 2, 2);
        let anchors = anchors(join, &policy, date(2024, 12, 31));
        let dates: Vec<NaiveDate> = anchors.iter().map(|a| a.grant_date).collect();
        assert_eq!(dates, vec![date(2023, 3, 2), date(2024, 3, 2)]);
    }

    #[test]
    fn fixed_anchors_skip_dates_before_join() {
        let mut policy = PolicyConfig::built_in();
        policy.baseline = BaselineRule::FixedMonthDay { month: 4, day: 1 };
        let join = date(2023, 6, 15);
        let anchors = anchors(join, &policy, date(2025, 4, 1));
        let dates: Vec<NaiveDate> = anchors.iter().map(|a| a.grant_date).collect();
        assert_eq!(dates, vec![date(2024, 4, 1), date(2025, 4, 1)]);
    }

    #[test]
    fn next_grant_date_steps_past_as_of() {
        let policy = relative_policy(6, 12);
        let join = date(2023, 2, 2);
        assert_eq!(
            next_grant_date(join, &policy, date(2023, 3, 1)),
            Some(date(2023, 8, 2))
        );
        assert_eq!(
            next_grant_date(join, &policy, date(2023, 8, 2)),
            Some(date(2024, 8, 2))
        );
        assert_eq!(
            next_grant_date(join, &policy, date(2026, 1, 1)),
            Some(date(2026, 8, 2))
        );
    }

    #[test]
    fn cycle_free_policy_has_no_next_date_after_first() {
        let policy = relative_policy(6, 0);
        let join = date(2023, 2, 2);
        assert_eq!(
            next_grant_date(join, &policy, date(2023, 3, 1)),
            Some(date(2023, 8, 2))
        );
        assert_eq!(next_grant_date(join, &policy, date(2023, 9, 1)), None);
    }

    #[test]
    fn previous_grant_date_is_latest_anchor() {
        let policy = relative_policy(6, 12);
        let join = date(2023, 2, 2);
        assert_eq!(previous_grant_date(join, &policy, date(2023, 7, 1)), None);
        assert_eq!(
            previous_grant_date(join, &policy, date(2024, 9, 1)),
            Some(date(2024, 8, 2))
        );
    }
}
