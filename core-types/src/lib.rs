//! Shared vocabulary for the leave ledger: day quantities, identifiers,
//! employment patterns, leave requests, and the deployment configuration.

pub mod config;
pub mod pattern;
pub mod types;

pub use config::AppConfig;
pub use pattern::{EmploymentPattern, PatternError};
pub use types::{Days, EmployeeId, LeaveRequest, RequestId, RequestStatus};
