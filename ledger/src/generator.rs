//! Grant lot generation: enumerate every grant date an employee has earned
//! and upsert the matching lots.

use chrono::NaiveDate;
use directory::EmployeeRecord;
use log::warn;

use crate::error::Result;
use crate::policy::PolicyConfig;
use crate::schedule::anchors;
use crate::store::{LedgerStore, LotUpsert};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub generated: usize,
    pub updated: usize,
}

/// Bring an employee's lots up to date through `until` under `policy`.
///
/// Re-running with the same inputs is a no-op. A policy-table change since a
/// lot was created replaces its granted amount and re-derives the balance
/// from recorded consumption. Caller holds the employee's mutation lock.
pub(crate) fn generate_for_employee(
    store: &LedgerStore,
    policy: &PolicyConfig,
    employee: &EmployeeRecord,
    until: NaiveDate,
) -> Result<GenerateOutcome> {
    let mut outcome = GenerateOutcome::default();

    let repaired = store.reconcile_duplicates(&employee.id);
    if repaired > 0 {
        warn!(
            "repaired {repaired} duplicate grant date(s) for employee {}",
            employee.id
        );
        outcome.updated += repaired;
    }

    for anchor in anchors(employee.join_date, policy, until) {
        let days = policy.grant_days(&employee.pattern, anchor.tenure_years);
        if days == 0.0 {
            continue;
        }
        let expiry = policy.expiry.expiry_for(anchor.grant_date);
        match store.upsert_lot(&employee.id, anchor.grant_date, days, expiry, &policy.version)? {
            LotUpsert::Created(_) => outcome.generated += 1,
            LotUpsert::Updated(_) => outcome.updated += 1,
            LotUpsert::Unchanged(_) => {}
        }
    }
    Ok(outcome)
}
