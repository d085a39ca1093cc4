use chrono::NaiveDate;
use core_types::{Days, EmployeeId, RequestId};
use serde::{Deserialize, Serialize};

pub type LotId = u64;
pub type ConsumptionId = u64;

/// A dated batch of granted leave with its own expiry and running balance.
///
/// Invariants: `0 <= days_remaining <= days_granted`; one lot per
/// `(employee_id, grant_date)`. Only `days_remaining` moves after creation
/// (consumption, expiry, recalculation) except when a policy-table change
/// recomputes `days_granted`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrantLot {
    pub id: LotId,
    pub employee_id: EmployeeId,
    pub grant_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub days_granted: Days,
    pub days_remaining: Days,
    pub policy_version: String,
}

impl GrantLot {
    /// A lot can fund leave on `date` while it still holds days and has not
    /// expired before that date.
    pub fn usable_on(&self, date: NaiveDate) -> bool {
        self.days_remaining > 0.0 && self.expiry_date >= date
    }

    pub fn expired_before(&self, as_of: NaiveDate) -> bool {
        self.expiry_date < as_of
    }
}

/// A debit against one lot for one approved request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    pub id: ConsumptionId,
    pub lot_id: LotId,
    pub employee_id: EmployeeId,
    pub request_id: RequestId,
    pub date: NaiveDate,
    pub days_used: Days,
}
