//! High-level ledger API.
//!
//! The controller owns the policy store, the lot book, and a per-employee
//! lock map. Every mutation for one employee (generate, expire, approve,
//! reverse, recalc) runs under that employee's lock, so a request approval
//! and the daily batch can never interleave on the same book.

use std::{collections::HashMap, sync::Arc};

use chrono::NaiveDate;
use core_types::{Days, EmployeeId, LeaveRequest};
use directory::{EmployeeDirectory, EmployeeRecord};
use log::{error, info};
use parking_lot::{Mutex, RwLock};
use serde_json::json;

use crate::allocator::{self, ConsumptionReceipt, ReversalReceipt};
use crate::audit::{AuditEvent, AuditSink, LogAuditSink};
use crate::error::Result;
use crate::generator::{self, GenerateOutcome};
use crate::policy::{PolicyConfig, PolicyStore};
use crate::store::LedgerStore;
use crate::summary::{self, BalanceSummary, ConsumptionAlert, LeaveStats, RecalcOutcome};

const EXPIRING_HORIZON_DAYS: i64 = 30;

#[derive(Clone, Debug)]
pub struct BatchFailure {
    pub employee_id: EmployeeId,
    pub error: String,
}

/// Outcome of a population-wide generation run.
#[derive(Clone, Debug, Default)]
pub struct GenerateBatchReport {
    pub processed: usize,
    pub generated: usize,
    pub updated: usize,
    pub failures: Vec<BatchFailure>,
}

pub struct LedgerController {
    policies: RwLock<PolicyStore>,
    store: LedgerStore,
    directory: Arc<dyn EmployeeDirectory>,
    audit: Arc<dyn AuditSink>,
    employee_locks: Mutex<HashMap<EmployeeId, Arc<Mutex<()>>>>,
}

impl LedgerController {
    pub fn bootstrap(policies: PolicyStore, directory: Arc<dyn EmployeeDirectory>) -> Self {
        Self::with_audit_sink(policies, directory, Arc::new(LogAuditSink))
    }

    pub fn with_audit_sink(
        policies: PolicyStore,
        directory: Arc<dyn EmployeeDirectory>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            policies: RwLock::new(policies),
            store: LedgerStore::new(),
            directory,
            audit,
            employee_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a pre-loaded (possibly file-backed) lot book.
    pub fn with_store(mut self, store: LedgerStore) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn persist(&self) -> Result<()> {
        self.store.persist()?;
        self.policies.read().persist()
    }

    fn employee_lock(&self, employee_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.employee_locks.lock();
        locks
            .entry(employee_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn resolve(&self, employee_id: &str) -> Result<(EmployeeRecord, PolicyConfig)> {
        let employee = self.directory.employee(employee_id)?;
        let policy = self
            .policies
            .read()
            .load(employee.policy_version.as_deref())?;
        Ok((employee, policy))
    }

    // ---- policy authoring -------------------------------------------------

    pub fn save_policy(&self, policy: PolicyConfig) -> Result<()> {
        let version = policy.version.clone();
        self.policies.write().save(policy)?;
        info!("saved policy version {version}");
        Ok(())
    }

    /// Swap the single active policy version. Affects future generation
    /// only; existing lots keep the version they were granted under.
    pub fn activate_policy(&self, version: &str) -> Result<()> {
        self.policies.write().activate(version)?;
        info!("activated policy version {version}");
        Ok(())
    }

    pub fn policy(&self, version: Option<&str>) -> Result<PolicyConfig> {
        self.policies.read().load(version)
    }

    pub fn active_policy_version(&self) -> Option<String> {
        self.policies.read().active_version().map(str::to_string)
    }

    pub fn policy_versions(&self) -> Vec<String> {
        self.policies
            .read()
            .versions()
            .map(str::to_string)
            .collect()
    }

    // ---- scheduled entry points ------------------------------------------

    pub fn generate_for_employee(
        &self,
        employee_id: &str,
        until: NaiveDate,
    ) -> Result<GenerateOutcome> {
        let (employee, policy) = self.resolve(employee_id)?;
        let lock = self.employee_lock(employee_id);
        let _guard = lock.lock();
        let outcome = generator::generate_for_employee(&self.store, &policy, &employee, until)?;
        if outcome.generated > 0 || outcome.updated > 0 {
            self.audit.record(AuditEvent::new(
                employee_id,
                "GRANT_LOTS_GENERATE",
                format!("Employee:{employee_id}"),
                json!({
                    "until": until,
                    "generated": outcome.generated,
                    "updated": outcome.updated,
                    "policy_version": policy.version,
                })
                .to_string(),
            ));
        }
        Ok(outcome)
    }

    /// Generate lots for every active employee through `until`. One
    /// employee's failure is recorded and skipped, never aborting the run.
    pub fn generate_all(&self, until: NaiveDate) -> Result<GenerateBatchReport> {
        let mut report = GenerateBatchReport::default();
        for employee in self.directory.active_employees()? {
            match self.generate_for_employee(&employee.id, until) {
                Ok(outcome) => {
                    report.processed += 1;
                    report.generated += outcome.generated;
                    report.updated += outcome.updated;
                }
                Err(err) => {
                    error!("lot generation failed for employee {}: {err}", employee.id);
                    report.failures.push(BatchFailure {
                        employee_id: employee.id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Zero out balances on lots past their expiry date, population-wide.
    /// Idempotent: a second call on the same date touches nothing.
    pub fn expire(&self, as_of: NaiveDate) -> Result<usize> {
        let mut expired = 0;
        for employee_id in self.store.employees() {
            let lock = self.employee_lock(&employee_id);
            let _guard = lock.lock();
            let count = self.store.expire_lots(&employee_id, as_of);
            if count > 0 {
                self.audit.record(AuditEvent::new(
                    employee_id.as_str(),
                    "GRANT_LOTS_EXPIRE",
                    format!("Employee:{employee_id}"),
                    json!({ "as_of": as_of, "lots_expired": count }).to_string(),
                ));
            }
            expired += count;
        }
        Ok(expired)
    }

    // ---- request workflow boundary ---------------------------------------

    /// Debit the ledger for an approved request. On `InsufficientBalance`
    /// nothing changes and the caller surfaces the rejection to the user.
    pub fn approve_request(&self, request: &LeaveRequest) -> Result<ConsumptionReceipt> {
        let lock = self.employee_lock(&request.employee_id);
        let _guard = lock.lock();
        let receipt = allocator::approve(
            &self.store,
            &request.employee_id,
            &request.id,
            request.start_date,
            request.total_days,
        )?;
        self.audit.record(AuditEvent::new(
            request.employee_id.as_str(),
            "REQUEST_CONSUME",
            format!("LeaveRequest:{}", request.id),
            serde_json::to_string(&receipt).expect("serialize receipt"),
        ));
        Ok(receipt)
    }

    /// Exactly reverse an earlier approval (rejection or cancellation).
    pub fn reverse_request(
        &self,
        employee_id: &str,
        request_id: &str,
    ) -> Result<ReversalReceipt> {
        let lock = self.employee_lock(employee_id);
        let _guard = lock.lock();
        let receipt = allocator::reverse(&self.store, employee_id, request_id)?;
        self.audit.record(AuditEvent::new(
            employee_id,
            "REQUEST_REVERSE",
            format!("LeaveRequest:{request_id}"),
            serde_json::to_string(&receipt).expect("serialize receipt"),
        ));
        Ok(receipt)
    }

    // ---- reporting --------------------------------------------------------

    pub fn summary(&self, employee_id: &str, as_of: NaiveDate) -> Result<BalanceSummary> {
        let (employee, policy) = self.resolve(employee_id)?;
        Ok(summary::summarize(&self.store, &employee, &policy, as_of))
    }

    pub fn stats(&self, employee_id: &str, as_of: NaiveDate) -> Result<LeaveStats> {
        let (employee, policy) = self.resolve(employee_id)?;
        Ok(summary::stats(
            &self.store,
            &employee,
            &policy,
            as_of,
            EXPIRING_HORIZON_DAYS,
        ))
    }

    pub fn alerts(&self, employee_id: &str, as_of: NaiveDate) -> Result<Vec<ConsumptionAlert>> {
        let (employee, policy) = self.resolve(employee_id)?;
        Ok(summary::check_alerts(&self.store, &employee, &policy, as_of))
    }

    /// Rebuild an employee's balances from recorded consumption, repairing
    /// drift from manual edits. Safe to run repeatedly.
    pub fn recalc(&self, employee_id: &str) -> Result<RecalcOutcome> {
        // Resolve first so an unknown employee is an error, not a no-op.
        let (employee, _) = self.resolve(employee_id)?;
        let lock = self.employee_lock(&employee.id);
        let _guard = lock.lock();
        let outcome = summary::recalc(&self.store, employee_id);
        if outcome.lots_adjusted > 0 {
            self.audit.record(AuditEvent::new(
                employee_id,
                "BALANCE_RECALC",
                format!("Employee:{employee_id}"),
                json!({ "lots_adjusted": outcome.lots_adjusted }).to_string(),
            ));
        }
        Ok(outcome)
    }

    /// Total remaining across non-expired lots; convenience for callers that
    /// only need the headline number.
    pub fn remaining_days(&self, employee_id: &str, as_of: NaiveDate) -> Result<Days> {
        Ok(self.summary(employee_id, as_of)?.total_remaining)
    }
}
