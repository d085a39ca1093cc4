//! Consumption allocation: debit lots when a request is approved, reverse
//! the debits when it is rejected or cancelled.

use chrono::NaiveDate;
use core_types::{types::is_half_step, Days, EmployeeId, RequestId};
use serde::Serialize;

use crate::error::{LedgerError, Result};
use crate::lot::{GrantLot, LotId};
use crate::store::LedgerStore;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LotDebit {
    pub lot_id: LotId,
    pub days: Days,
}

/// What an approval did, for the caller and the audit trail.
#[derive(Clone, Debug, Serialize)]
pub struct ConsumptionReceipt {
    pub request_id: RequestId,
    pub employee_id: EmployeeId,
    pub total_days: Days,
    pub debits: Vec<LotDebit>,
}

/// What a reversal restored.
#[derive(Clone, Debug, Serialize)]
pub struct ReversalReceipt {
    pub request_id: RequestId,
    pub employee_id: EmployeeId,
    pub total_days: Days,
    pub credits: Vec<LotDebit>,
}

/// Plan a FIFO debit across usable lots: oldest grant first, so days are
/// used before they expire. Pure; the caller commits the plan atomically.
pub(crate) fn plan_debits(
    employee_id: &str,
    lots: &[GrantLot],
    start_date: NaiveDate,
    need: Days,
) -> Result<Vec<LotDebit>> {
    if !is_half_step(need) || need == 0.0 {
        return Err(LedgerError::InvalidAmount { amount: need });
    }
    let mut remaining = need;
    let mut debits = Vec::new();
    for lot in lots.iter().filter(|lot| lot.usable_on(start_date)) {
        if remaining <= 0.0 {
            break;
        }
        let take = lot.days_remaining.min(remaining);
        debits.push(LotDebit {
            lot_id: lot.id,
            days: take,
        });
        remaining -= take;
    }
    if remaining > 0.0 {
        return Err(LedgerError::InsufficientBalance {
            employee_id: employee_id.to_string(),
            requested: need,
            short: remaining,
        });
    }
    Ok(debits)
}

/// Debit `total_days` for an approved request as one atomic unit. On any
/// failure no consumption rows persist and no balance moves.
pub(crate) fn approve(
    store: &LedgerStore,
    employee_id: &str,
    request_id: &str,
    start_date: NaiveDate,
    total_days: Days,
) -> Result<ConsumptionReceipt> {
    let lots = store.lots_for(employee_id);
    let debits = plan_debits(employee_id, &lots, start_date, total_days)?;
    let plan: Vec<(LotId, Days)> = debits.iter().map(|d| (d.lot_id, d.days)).collect();
    store.commit_consumption(employee_id, request_id, start_date, &plan)?;
    Ok(ConsumptionReceipt {
        request_id: request_id.to_string(),
        employee_id: employee_id.to_string(),
        total_days,
        debits,
    })
}

/// Exactly undo an earlier approval: each consumption row's amount goes back
/// onto its originating lot (even one that has since expired) and the row is
/// deleted.
pub(crate) fn reverse(
    store: &LedgerStore,
    employee_id: &str,
    request_id: &str,
) -> Result<ReversalReceipt> {
    let removed = store.remove_request(employee_id, request_id)?;
    let credits: Vec<LotDebit> = removed
        .iter()
        .map(|row| LotDebit {
            lot_id: row.lot_id,
            days: row.days_used,
        })
        .collect();
    let total_days = credits.iter().map(|c| c.days).sum();
    Ok(ReversalReceipt {
        request_id: request_id.to_string(),
        employee_id: employee_id.to_string(),
        total_days,
        credits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded_store() -> (LedgerStore, Vec<LotId>) {
        let store = LedgerStore::new();
        let mut ids = Vec::new();
        for (grant, expiry, days) in [
            (date(2023, 8, 2), date(2025, 8, 1), 3.0),
            (date(2024, 8, 2), date(2026, 8, 1), 11.0),
            (date(2025, 8, 2), date(2027, 8, 1), 12.0),
        ] {
            match store.upsert_lot("e-1", grant, days, expiry, "v1") {
                Ok(crate::store::LotUpsert::Created(id)) => ids.push(id),
                other => panic!("unexpected upsert result {other:?}"),
            }
        }
        (store, ids)
    }

    #[test]
    fn debits_walk_oldest_grants_first() {
        let (store, ids) = seeded_store();
        let receipt = approve(&store, "e-1", "r-1", date(2025, 9, 1), 5.0).unwrap();

        // The 2023 lot expired before the request start, so it is skipped.
        assert_eq!(receipt.debits.len(), 1);
        assert_eq!(receipt.debits[0].lot_id, ids[1]);
        assert_eq!(receipt.debits[0].days, 5.0);

        let receipt = approve(&store, "e-1", "r-2", date(2025, 9, 1), 7.0).unwrap();
        assert_eq!(receipt.debits[0].lot_id, ids[1]);
        assert_eq!(receipt.debits[0].days, 6.0);
        assert_eq!(receipt.debits[1].lot_id, ids[2]);
        assert_eq!(receipt.debits[1].days, 1.0);
    }

    #[test]
    fn shortfall_leaves_the_ledger_untouched() {
        let (store, _) = seeded_store();
        let before = store.lots_for("e-1");

        let err = approve(&store, "e-1", "r-1", date(2025, 9, 1), 40.0).unwrap_err();
        match err {
            LedgerError::InsufficientBalance {
                requested, short, ..
            } => {
                assert_eq!(requested, 40.0);
                assert_eq!(short, 17.0);
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(store.lots_for("e-1"), before);
        assert!(store.consumptions_for("e-1").is_empty());
    }

    #[test]
    fn non_half_step_amounts_are_rejected() {
        let (store, _) = seeded_store();
        assert!(matches!(
            approve(&store, "e-1", "r-1", date(2025, 9, 1), 1.25),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            approve(&store, "e-1", "r-1", date(2025, 9, 1), 0.0),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn reverse_restores_pre_approval_balances() {
        let (store, _) = seeded_store();
        let before = store.lots_for("e-1");

        approve(&store, "e-1", "r-1", date(2025, 9, 1), 12.5).unwrap();
        let receipt = reverse(&store, "e-1", "r-1").unwrap();
        assert_eq!(receipt.total_days, 12.5);
        assert_eq!(store.lots_for("e-1"), before);
        assert!(store.consumptions_for_request("e-1", "r-1").is_empty());
    }

    #[test]
    fn reverse_restores_onto_expired_lots() {
        let (store, ids) = seeded_store();
        approve(&store, "e-1", "r-1", date(2024, 9, 2), 3.0).unwrap();

        // The funding lot expires before the reversal arrives.
        assert_eq!(store.expire_lots("e-1", date(2025, 8, 2)), 1);
        let receipt = reverse(&store, "e-1", "r-1").unwrap();
        assert_eq!(receipt.credits[0].lot_id, ids[0]);

        let restored = store
            .lots_for("e-1")
            .into_iter()
            .find(|lot| lot.id == ids[0])
            .unwrap();
        assert_eq!(restored.days_remaining, 3.0);
        // The next expiry pass reclaims the restored amount.
        assert_eq!(store.expire_lots("e-1", date(2025, 8, 2)), 1);
    }

    #[test]
    fn reversing_an_unknown_request_fails() {
        let (store, _) = seeded_store();
        assert!(matches!(
            reverse(&store, "e-1", "r-404"),
            Err(LedgerError::UnknownRequest { .. })
        ));
    }
}
