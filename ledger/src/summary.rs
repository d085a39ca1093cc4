//! Balance reporting and drift repair.

use chrono::NaiveDate;
use core_types::{Days, EmployeeId, LeaveRequest, RequestStatus};
use directory::EmployeeRecord;
use serde::Serialize;

use crate::lot::LotId;
use crate::policy::{AlertCheckpoint, PolicyConfig};
use crate::schedule::{add_months, next_grant_date, previous_grant_date};
use crate::store::LedgerStore;

#[derive(Clone, Debug, Serialize)]
pub struct LotBalance {
    pub lot_id: LotId,
    pub grant_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub days_granted: Days,
    pub days_remaining: Days,
    pub policy_version: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct BalanceSummary {
    pub employee_id: EmployeeId,
    pub total_remaining: Days,
    pub per_lot: Vec<LotBalance>,
    pub next_grant_date: Option<NaiveDate>,
}

/// Extended figures for dashboards and period reporting.
#[derive(Clone, Debug, Serialize)]
pub struct LeaveStats {
    pub employee_id: EmployeeId,
    pub total_remaining: Days,
    pub total_granted: Days,
    /// Start of the current grant cycle: the latest grant date, or the join
    /// date before the first grant.
    pub cycle_start: NaiveDate,
    pub used_in_cycle: Days,
    /// Balance that will be forfeited within the reporting horizon.
    pub expiring_soon: Days,
    pub next_grant_date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecalcOutcome {
    pub lots_adjusted: usize,
}

/// A due consumption checkpoint the employee has not met.
#[derive(Clone, Debug, Serialize)]
pub struct ConsumptionAlert {
    pub checkpoint: AlertCheckpoint,
    pub due_date: NaiveDate,
    pub consumed: Days,
    pub shortfall: Days,
}

/// Remaining balance over non-expired lots plus the next grant date.
pub(crate) fn summarize(
    store: &LedgerStore,
    employee: &EmployeeRecord,
    policy: &PolicyConfig,
    as_of: NaiveDate,
) -> BalanceSummary {
    let per_lot: Vec<LotBalance> = store
        .lots_for(&employee.id)
        .into_iter()
        .filter(|lot| !lot.expired_before(as_of))
        .map(|lot| LotBalance {
            lot_id: lot.id,
            grant_date: lot.grant_date,
            expiry_date: lot.expiry_date,
            days_granted: lot.days_granted,
            days_remaining: lot.days_remaining,
            policy_version: lot.policy_version,
        })
        .collect();
    let total_remaining = per_lot.iter().map(|lot| lot.days_remaining).sum();
    BalanceSummary {
        employee_id: employee.id.clone(),
        total_remaining,
        per_lot,
        next_grant_date: next_grant_date(employee.join_date, policy, as_of),
    }
}

pub(crate) fn stats(
    store: &LedgerStore,
    employee: &EmployeeRecord,
    policy: &PolicyConfig,
    as_of: NaiveDate,
    expiring_horizon_days: i64,
) -> LeaveStats {
    let lots = store.lots_for(&employee.id);
    let total_remaining = lots
        .iter()
        .filter(|lot| !lot.expired_before(as_of))
        .map(|lot| lot.days_remaining)
        .sum();
    let total_granted = lots.iter().map(|lot| lot.days_granted).sum();
    let horizon = as_of + chrono::Duration::days(expiring_horizon_days);
    let expiring_soon = lots
        .iter()
        .filter(|lot| lot.expiry_date >= as_of && lot.expiry_date <= horizon)
        .map(|lot| lot.days_remaining)
        .sum();
    let cycle_start =
        previous_grant_date(employee.join_date, policy, as_of).unwrap_or(employee.join_date);
    LeaveStats {
        employee_id: employee.id.clone(),
        total_remaining,
        total_granted,
        cycle_start,
        used_in_cycle: used_in_cycle(store, employee, cycle_start, as_of),
        expiring_soon,
        next_grant_date: next_grant_date(employee.join_date, policy, as_of),
    }
}

fn used_in_cycle(
    store: &LedgerStore,
    employee: &EmployeeRecord,
    cycle_start: NaiveDate,
    as_of: NaiveDate,
) -> Days {
    store
        .consumptions_for(&employee.id)
        .into_iter()
        .filter(|c| c.date >= cycle_start && c.date <= as_of)
        .map(|c| c.days_used)
        .sum()
}

/// Days requested but not yet approved; the request workflow passes its
/// pending set in.
pub fn pending_days(requests: &[LeaveRequest]) -> Days {
    requests
        .iter()
        .filter(|req| req.status == RequestStatus::Pending)
        .map(|req| req.total_days)
        .sum()
}

/// Evaluate the policy's consumption checkpoints. Employees whose latest
/// grant is below the alert threshold are exempt; otherwise every checkpoint
/// already due and not met produces an alert.
pub(crate) fn check_alerts(
    store: &LedgerStore,
    employee: &EmployeeRecord,
    policy: &PolicyConfig,
    as_of: NaiveDate,
) -> Vec<ConsumptionAlert> {
    let lots = store.lots_for(&employee.id);
    let latest_grant = lots
        .iter()
        .filter(|lot| lot.grant_date <= as_of)
        .last();
    let Some(latest) = latest_grant else {
        return Vec::new();
    };
    if latest.days_granted < policy.alert.min_grant_days_for_alert {
        return Vec::new();
    }
    let Some(next) = next_grant_date(employee.join_date, policy, as_of) else {
        return Vec::new();
    };
    let consumed = used_in_cycle(store, employee, latest.grant_date, as_of);
    policy
        .alert
        .checkpoints
        .iter()
        .filter_map(|checkpoint| {
            let due_date = add_months(next, -(checkpoint.months_before as i32));
            if as_of >= due_date && consumed < checkpoint.min_consumed_days {
                Some(ConsumptionAlert {
                    checkpoint: *checkpoint,
                    due_date,
                    consumed,
                    shortfall: checkpoint.min_consumed_days - consumed,
                })
            } else {
                None
            }
        })
        .collect()
}

pub(crate) fn recalc(store: &LedgerStore, employee_id: &str) -> RecalcOutcome {
    RecalcOutcome {
        lots_adjusted: store.rebuild_balances(employee_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::EmploymentPattern;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn employee() -> EmployeeRecord {
        EmployeeRecord {
            id: "e-1".to_string(),
            name: "Test Employee".to_string(),
            join_date: date(2023, 2, 2),
            pattern: EmploymentPattern::FullTime,
            policy_version: None,
            active: true,
        }
    }

    fn seeded_store() -> LedgerStore {
        let store = LedgerStore::new();
        store.upsert_lot("e-1", date(2023, 8, 2), 10.0, date(2025, 8, 1), "v1").unwrap();
        store.upsert_lot("e-1", date(2024, 8, 2), 11.0, date(2026, 8, 1), "v1").unwrap();
        store
    }

    #[test]
    fn summary_counts_non_expired_lots_only() {
        let store = seeded_store();
        let policy = PolicyConfig::built_in();

        let summary = summarize(&store, &employee(), &policy, date(2025, 9, 1));
        assert_eq!(summary.per_lot.len(), 1);
        assert_eq!(summary.total_remaining, 11.0);
        assert_eq!(summary.next_grant_date, Some(date(2026, 8, 2)));

        let earlier = summarize(&store, &employee(), &policy, date(2025, 1, 1));
        assert_eq!(earlier.total_remaining, 21.0);
    }

    #[test]
    fn stats_track_cycle_usage_and_expiring_balance() {
        let store = seeded_store();
        let policy = PolicyConfig::built_in();
        let lot_id = store.lots_for("e-1")[1].id;
        store
            .commit_consumption("e-1", "r-1", date(2024, 9, 2), &[(lot_id, 2.0)])
            .unwrap();

        let stats = stats(&store, &employee(), &policy, date(2025, 7, 15), 30);
        assert_eq!(stats.cycle_start, date(2024, 8, 2));
        assert_eq!(stats.used_in_cycle, 2.0);
        assert_eq!(stats.total_granted, 21.0);
        // The 2023 lot (10 days left) expires 2025-08-01, inside the horizon.
        assert_eq!(stats.expiring_soon, 10.0);
        assert_eq!(stats.total_remaining, 19.0);
    }

    #[test]
    fn pending_days_sums_pending_requests_only() {
        let request = |status, days| LeaveRequest {
            id: "r".to_string(),
            employee_id: "e-1".to_string(),
            start_date: date(2025, 3, 10),
            end_date: date(2025, 3, 12),
            total_days: days,
            status,
        };
        let requests = vec![
            request(RequestStatus::Pending, 2.0),
            request(RequestStatus::Pending, 0.5),
            request(RequestStatus::Approved, 3.0),
            request(RequestStatus::Rejected, 1.0),
        ];
        assert_eq!(pending_days(&requests), 2.5);
    }

    #[test]
    fn alerts_fire_for_unmet_due_checkpoints() {
        let store = seeded_store();
        let policy = PolicyConfig::built_in();
        let lot_id = store.lots_for("e-1")[1].id;
        store
            .commit_consumption("e-1", "r-1", date(2024, 9, 2), &[(lot_id, 4.0)])
            .unwrap();

        // Next grant 2025-08-02; checkpoints at 3/2/1 months before.
        let alerts = check_alerts(&store, &employee(), &policy, date(2025, 6, 10));
        // Due: 3-month (needs 5) and 2-month (needs 3). Consumed 4 satisfies
        // the 2-month checkpoint; the 1-month one is not due yet.
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].checkpoint.months_before, 3);
        assert_eq!(alerts[0].shortfall, 1.0);

        let all_due = check_alerts(&store, &employee(), &policy, date(2025, 7, 10));
        assert_eq!(all_due.len(), 2);
    }

    #[test]
    fn small_grants_are_exempt_from_alerts() {
        let store = LedgerStore::new();
        store.upsert_lot("e-1", date(2024, 8, 2), 7.0, date(2026, 8, 1), "v1").unwrap();
        let policy = PolicyConfig::built_in();
        assert!(check_alerts(&store, &employee(), &policy, date(2025, 7, 10)).is_empty());
    }

    #[test]
    fn recalc_is_idempotent() {
        let store = seeded_store();
        let lot_id = store.lots_for("e-1")[0].id;
        store.override_remaining("e-1", lot_id, 25.0);

        assert_eq!(recalc(&store, "e-1").lots_adjusted, 1);
        assert_eq!(store.lots_for("e-1")[0].days_remaining, 10.0);
        assert_eq!(recalc(&store, "e-1").lots_adjusted, 0);
    }
}
