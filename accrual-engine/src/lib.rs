//! Daily accrual engine.
//!
//! Runs the two idempotent ledger entry points once per local calendar day:
//! generate-up-to-today for every active employee, then expire-as-of-today.
//! The worker wakes on a short tick and checks whether the date rolled over,
//! so there is no wall-clock alarm to drift; both entry points can also be
//! invoked directly for a manual run.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use chrono::{Local, NaiveDate};
use engine_api::{Cadence, Engine, EngineError, EngineHealth, EngineResult, HealthStatus};
use ledger::{BatchFailure, LedgerController, LedgerError};
use log::{error, info, warn};
use parking_lot::Mutex;

const DEFAULT_TICK_SECS: u64 = 300;

#[derive(Clone)]
pub struct AccrualEngineConfig {
    pub label: String,
    /// How often the worker checks for a date rollover.
    pub tick_interval: Duration,
    /// Run immediately on start instead of waiting for the next rollover.
    pub run_on_start: bool,
}

impl Default for AccrualEngineConfig {
    fn default() -> Self {
        Self {
            label: "dev".to_string(),
            tick_interval: Duration::from_secs(DEFAULT_TICK_SECS),
            run_on_start: false,
        }
    }
}

/// What one daily pass did, for logs and observability.
#[derive(Clone, Debug)]
pub struct DailyRunReport {
    pub run_date: NaiveDate,
    pub employees_processed: usize,
    pub lots_generated: usize,
    pub lots_updated: usize,
    pub lots_expired: usize,
    pub failures: Vec<BatchFailure>,
}

pub struct AccrualEngine {
    inner: Arc<AccrualInner>,
}

impl AccrualEngine {
    pub fn new(config: AccrualEngineConfig, controller: Arc<LedgerController>) -> Self {
        Self {
            inner: AccrualInner::new(config, controller),
        }
    }

    /// Manual trigger: run today's pass right now, regardless of schedule.
    pub fn run_now(&self) -> Result<DailyRunReport, LedgerError> {
        self.inner.run_daily(Local::now().date_naive())
    }

    pub fn last_report(&self) -> Option<DailyRunReport> {
        self.inner.last_report.lock().clone()
    }
}

impl Engine for AccrualEngine {
    fn label(&self) -> &str {
        &self.inner.config.label
    }

    fn start(&self) -> EngineResult<()> {
        AccrualInner::start(&self.inner)
    }

    fn stop(&self) -> EngineResult<()> {
        self.inner.stop()
    }

    fn health(&self) -> EngineHealth {
        self.inner.health.lock().clone()
    }

    fn cadence(&self) -> Cadence {
        Cadence {
            summary: format!(
                "daily at local date rollover (tick {}s)",
                self.inner.config.tick_interval.as_secs()
            ),
            manual_trigger: true,
        }
    }
}

struct ThreadBundle {
    cancel: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

enum RuntimeState {
    Stopped,
    Running(ThreadBundle),
}

impl RuntimeState {
    fn take_running(&mut self) -> Option<ThreadBundle> {
        match std::mem::replace(self, RuntimeState::Stopped) {
            RuntimeState::Running(bundle) => Some(bundle),
            RuntimeState::Stopped => None,
        }
    }
}

struct AccrualInner {
    config: AccrualEngineConfig,
    controller: Arc<LedgerController>,
    state: Mutex<RuntimeState>,
    health: Mutex<EngineHealth>,
    last_run: Mutex<Option<NaiveDate>>,
    last_report: Mutex<Option<DailyRunReport>>,
}

impl AccrualInner {
    fn new(config: AccrualEngineConfig, controller: Arc<LedgerController>) -> Arc<Self> {
        Arc::new(Self {
            config,
            controller,
            state: Mutex::new(RuntimeState::Stopped),
            health: Mutex::new(EngineHealth::default()),
            last_run: Mutex::new(None),
            last_report: Mutex::new(None),
        })
    }

    fn start(this: &Arc<Self>) -> EngineResult<()> {
        let mut guard = this.state.lock();
        if matches!(*guard, RuntimeState::Running(_)) {
            return Err(EngineError::AlreadyRunning);
        }
        this.set_health(HealthStatus::Starting, None);
        if !this.config.run_on_start {
            // Skip the partial first day; the next rollover runs the pass.
            *this.last_run.lock() = Some(Local::now().date_naive());
        }
        let cancel = Arc::new(AtomicBool::new(false));
        let runner = Arc::clone(this);
        let cancel_clone = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name(format!("{}-accrual", this.config.label))
            .spawn(move || runner.run(cancel_clone))
            .map_err(|err| EngineError::Failure {
                source: Box::new(err),
            })?;
        info!("[{}] accrual engine starting", this.config.label);
        *guard = RuntimeState::Running(ThreadBundle { cancel, handle });
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        let mut guard = self.state.lock();
        let Some(bundle) = guard.take_running() else {
            return Err(EngineError::NotRunning);
        };
        bundle.cancel.store(true, Ordering::Relaxed);
        if bundle.handle.join().is_err() {
            error!("[{}] accrual worker panicked", self.config.label);
        }
        self.set_health(HealthStatus::Stopped, None);
        info!("[{}] accrual engine stopped", self.config.label);
        Ok(())
    }

    fn run(self: Arc<Self>, cancel: Arc<AtomicBool>) {
        self.set_health(HealthStatus::Ready, None);
        while !cancel.load(Ordering::Relaxed) {
            let today = Local::now().date_naive();
            let due = *self.last_run.lock() != Some(today);
            if due {
                match self.run_daily(today) {
                    Ok(report) => {
                        if report.failures.is_empty() {
                            self.set_health(HealthStatus::Ready, None);
                        } else {
                            self.set_health(
                                HealthStatus::Degraded,
                                Some(format!("{} employee(s) failed", report.failures.len())),
                            );
                        }
                    }
                    Err(err) => {
                        error!("[{}] daily pass failed: {err}", self.config.label);
                        self.set_health(HealthStatus::Degraded, Some(err.to_string()));
                    }
                }
            }
            thread::sleep(self.config.tick_interval);
        }
    }

    fn run_daily(&self, today: NaiveDate) -> Result<DailyRunReport, LedgerError> {
        let generation = self.controller.generate_all(today)?;
        let expired = self.controller.expire(today)?;
        let report = DailyRunReport {
            run_date: today,
            employees_processed: generation.processed,
            lots_generated: generation.generated,
            lots_updated: generation.updated,
            lots_expired: expired,
            failures: generation.failures,
        };
        info!(
            "[{}] daily pass {}: {} employees, {} generated, {} updated, {} expired",
            self.config.label,
            report.run_date,
            report.employees_processed,
            report.lots_generated,
            report.lots_updated,
            report.lots_expired
        );
        for failure in &report.failures {
            warn!(
                "[{}] employee {} skipped: {}",
                self.config.label, failure.employee_id, failure.error
            );
        }
        if let Err(err) = self.controller.persist() {
            warn!("[{}] ledger snapshot failed: {err}", self.config.label);
        }
        *self.last_run.lock() = Some(today);
        *self.last_report.lock() = Some(report.clone());
        Ok(report)
    }

    fn set_health(&self, status: HealthStatus, detail: Option<String>) {
        *self.health.lock() = EngineHealth::new(status, detail);
    }
}
