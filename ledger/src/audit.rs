//! Audit emission port. The ledger does not own audit storage; it hands
//! every mutation to a sink with enough detail for an external history or
//! point-in-time snapshot to be recorded.

use core_types::EmployeeId;
use log::info;

#[derive(Clone, Debug)]
pub struct AuditEvent {
    pub employee_id: EmployeeId,
    pub action: &'static str,
    pub entity: String,
    /// Json payload: amounts, lot ids touched, counts.
    pub detail: String,
}

impl AuditEvent {
    pub fn new(
        employee_id: impl Into<EmployeeId>,
        action: &'static str,
        entity: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            action,
            entity: entity.into(),
            detail: detail.into(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: one structured log line per event.
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            "[audit] action={} employee={} entity={} detail={}",
            event.action, event.employee_id, event.entity, event.detail
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Captures events so tests can assert on the emitted trail.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<AuditEvent>>,
    }

    impl AuditSink for RecordingSink {
        fn record(&self, event: AuditEvent) {
            self.events.lock().push(event);
        }
    }
}
