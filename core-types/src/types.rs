use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Leave quantity in days. Every ledger amount is a non-negative multiple of
/// 0.5; halves are exactly representable, so sums and comparisons stay exact.
pub type Days = f64;

pub type EmployeeId = String;
pub type RequestId = String;

/// True when `value` is a usable ledger amount (non-negative half-day step).
pub fn is_half_step(value: Days) -> bool {
    value.is_finite() && value >= 0.0 && (value * 2.0).fract() == 0.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

/// The slice of a leave request the ledger core reads; the request workflow
/// owns everything else (approver chain, comments, attachments).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: RequestId,
    pub employee_id: EmployeeId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: Days,
    pub status: RequestStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_step_accepts_halves_only() {
        assert!(is_half_step(0.0));
        assert!(is_half_step(0.5));
        assert!(is_half_step(14.0));
        assert!(!is_half_step(0.25));
        assert!(!is_half_step(-0.5));
        assert!(!is_half_step(f64::NAN));
    }
}
