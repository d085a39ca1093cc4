//! Leave accrual and consumption ledger.
//!
//! The crate exposes:
//! - [`LedgerController`]: high-level API orchestrating policy resolution and
//!   all per-employee ledger mutations.
//! - [`PolicyStore`] / [`PolicyConfig`]: versioned accrual policy documents,
//!   at most one active at a time.
//! - [`LedgerStore`]: the grant-lot and consumption book, with atomic
//!   multi-lot commits and upserts keyed on `(employee, grant date)`.
//! - schedule math ([`tenure_years`], [`next_grant_date`]), the lot
//!   generator, the FIFO consumption allocator, and balance summaries.

pub mod allocator;
pub mod audit;
pub mod controller;
pub mod error;
pub mod generator;
pub mod lot;
pub mod policy;
pub mod rounding;
pub mod schedule;
pub mod store;
pub mod summary;

pub use allocator::{ConsumptionReceipt, LotDebit, ReversalReceipt};
pub use audit::{AuditEvent, AuditSink, LogAuditSink};
pub use controller::{BatchFailure, GenerateBatchReport, LedgerController};
pub use error::{LedgerError, Result};
pub use generator::GenerateOutcome;
pub use lot::{Consumption, ConsumptionId, GrantLot, LotId};
pub use policy::{
    AlertCheckpoint, AlertRule, BaselineRule, ExpiryRule, GrantRow, PolicyConfig, PolicyStore,
};
pub use rounding::{LeaveUnit, RoundingMode, RoundingRule};
pub use schedule::{next_grant_date, previous_grant_date, tenure_years, GrantAnchor};
pub use store::LedgerStore;
pub use summary::{BalanceSummary, ConsumptionAlert, LeaveStats, LotBalance, RecalcOutcome};
