//! Lifecycle contract for managed background services.
//!
//! Every long-running worker in the system (today: the accrual engine) is an
//! explicit object with owned start/stop state, not a module-level timer
//! flag. The binary starts engines after wiring, polls their health for the
//! startup report, and stops them on shutdown.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

pub trait Engine: Send + Sync {
    /// Short deployment label used to prefix log lines.
    fn label(&self) -> &str;
    fn start(&self) -> EngineResult<()>;
    fn stop(&self) -> EngineResult<()>;
    fn health(&self) -> EngineHealth;
    /// Human-readable description of when the engine does useful work.
    fn cadence(&self) -> Cadence;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    Starting,
    Ready,
    Degraded,
    Failed,
    Stopped,
}

#[derive(Clone, Debug)]
pub struct EngineHealth {
    pub status: HealthStatus,
    pub detail: Option<String>,
}

impl EngineHealth {
    pub fn new(status: HealthStatus, detail: Option<String>) -> Self {
        Self { status, detail }
    }
}

impl Default for EngineHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Stopped,
            detail: None,
        }
    }
}

/// Work rhythm of an engine, for startup reports and diagnostics.
#[derive(Clone, Debug)]
pub struct Cadence {
    pub summary: String,
    /// Whether the engine's work can also be invoked directly as an
    /// idempotent call (scheduled triggers are such calls here).
    pub manual_trigger: bool,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine already running")]
    AlreadyRunning,
    #[error("engine is not running")]
    NotRunning,
    #[error("engine encountered an error: {source}")]
    Failure {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
