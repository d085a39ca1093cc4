//! Binary wiring for the leave ledger: config, stores, controller, engine.

use std::{
    process,
    sync::{mpsc, Arc},
    time::Duration,
};

use accrual_engine::{AccrualEngine, AccrualEngineConfig};
use chrono::Local;
use config::ConfigError;
use core_types::AppConfig;
use directory::{DirectoryError, EmployeeDirectory, MemoryDirectory};
use engine_api::{Engine, EngineError};
use ledger::{LedgerController, LedgerError, LedgerStore, PolicyStore};
use thiserror::Error;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("leavecore failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    config.ensure_dirs()?;

    let policies = PolicyStore::load_or_init(config.policy_file())?;
    let store = LedgerStore::load_or_init(config.ledger_file())?;
    let directory = Arc::new(MemoryDirectory::load_or_init(config.directory_file())?);
    let controller = Arc::new(
        LedgerController::bootstrap(policies, directory.clone()).with_store(store),
    );

    println!(
        "leavecore booted; ledger state at {}",
        config.state_dir().display()
    );
    println!(
        "Policy versions on file: {}; active: {}",
        controller.policy_versions().len(),
        controller
            .active_policy_version()
            .unwrap_or_else(|| "built-in default".to_string())
    );
    println!(
        "Directory: {} employee record(s), {} active",
        directory.len(),
        directory.active_employees()?.len()
    );

    let engine = AccrualEngine::new(
        AccrualEngineConfig {
            label: config.scheduler.label.clone(),
            tick_interval: Duration::from_secs(config.scheduler.tick_interval_s.max(1)),
            run_on_start: config.scheduler.run_on_start,
        },
        controller.clone(),
    );
    engine.start()?;
    println!(
        "Accrual engine is running ({}); press Ctrl+C to shut down.",
        engine.cadence().summary
    );

    wait_for_shutdown_signal()?;
    println!("Shutdown signal received; stopping accrual engine...");
    engine.stop()?;

    if let Some(report) = engine.last_report() {
        println!(
            "Last daily pass {}: {} generated, {} updated, {} expired",
            report.run_date, report.lots_generated, report.lots_updated, report.lots_expired
        );
    }
    controller.persist()?;
    println!(
        "Ledger snapshot written at {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

fn wait_for_shutdown_signal() -> Result<(), AppError> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;
    rx.recv()?;
    Ok(())
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("failed while waiting for shutdown signal: {0}")]
    ShutdownWait(#[from] mpsc::RecvError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
