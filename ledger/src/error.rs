use std::io;

use chrono::NaiveDate;
use core_types::{Days, EmployeeId, RequestId};
use directory::DirectoryError;
use thiserror::Error;

use crate::lot::LotId;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("policy version {version} not found")]
    PolicyNotFound { version: String },
    #[error(
        "insufficient balance for employee {employee_id}: requested {requested}, short {short}"
    )]
    InsufficientBalance {
        employee_id: EmployeeId,
        requested: Days,
        short: Days,
    },
    #[error("conflicting grant lots for employee {employee_id} on {grant_date}")]
    DuplicateGrant {
        employee_id: EmployeeId,
        grant_date: NaiveDate,
    },
    #[error("request {request_id} has no recorded consumption")]
    UnknownRequest { request_id: RequestId },
    #[error("lot {lot_id} does not exist for employee {employee_id}")]
    UnknownLot {
        employee_id: EmployeeId,
        lot_id: LotId,
    },
    #[error("invalid policy document: {reason}")]
    InvalidPolicy { reason: String },
    #[error("invalid leave amount {amount}: must be a positive half-day multiple")]
    InvalidAmount { amount: Days },
    #[error("hour-unit requests need the employee's hours per day")]
    MissingHoursPerDay,
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
