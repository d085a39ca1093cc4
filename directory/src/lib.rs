//! Employee directory port.
//!
//! The ledger reads employees through [`EmployeeDirectory`] and never writes
//! back; the directory of record lives elsewhere in the platform. The
//! in-repo [`MemoryDirectory`] keeps records in memory, seeded from a simple
//! json file, and is what the binary and the tests run against.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use core_types::{EmployeeId, EmploymentPattern};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("employee {0} not found in directory")]
    UnknownEmployee(EmployeeId),
    #[error("malformed directory file {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid record for employee {employee_id}: {reason}")]
    InvalidRecord {
        employee_id: EmployeeId,
        reason: String,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Directory fields the ledger depends on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    pub name: String,
    pub join_date: NaiveDate,
    pub pattern: EmploymentPattern,
    /// Pinned policy version; `None` falls back to the active policy.
    #[serde(default)]
    pub policy_version: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl EmployeeRecord {
    fn validate(&self) -> Result<(), DirectoryError> {
        self.pattern
            .validate()
            .map_err(|err| DirectoryError::InvalidRecord {
                employee_id: self.id.clone(),
                reason: err.to_string(),
            })
    }
}

pub trait EmployeeDirectory: Send + Sync {
    fn employee(&self, id: &str) -> Result<EmployeeRecord, DirectoryError>;
    /// Active employees in stable id order, for deterministic batch runs.
    fn active_employees(&self) -> Result<Vec<EmployeeRecord>, DirectoryError>;
}

#[derive(Serialize, Deserialize, Default)]
struct DirectoryFile {
    employees: Vec<EmployeeRecord>,
}

/// In-memory directory backed by a simple json seed file.
pub struct MemoryDirectory {
    records: RwLock<HashMap<EmployeeId, EmployeeRecord>>,
    path: Option<PathBuf>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref().to_path_buf();
        let mut records = HashMap::new();
        if path.exists() {
            let bytes = fs::read(&path)?;
            if !bytes.is_empty() {
                let file: DirectoryFile =
                    serde_json::from_slice(&bytes).map_err(|source| DirectoryError::Malformed {
                        path: path.clone(),
                        source,
                    })?;
                for record in file.employees {
                    record.validate()?;
                    records.insert(record.id.clone(), record);
                }
            }
        }
        Ok(Self {
            records: RwLock::new(records),
            path: Some(path),
        })
    }

    pub fn persist(&self) -> Result<(), DirectoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut employees: Vec<EmployeeRecord> = self.records.read().values().cloned().collect();
        employees.sort_by(|a, b| a.id.cmp(&b.id));
        let file = DirectoryFile { employees };
        let bytes = serde_json::to_vec_pretty(&file).expect("serialize directory");
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn upsert(&self, record: EmployeeRecord) -> Result<(), DirectoryError> {
        record.validate()?;
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl EmployeeDirectory for MemoryDirectory {
    fn employee(&self, id: &str) -> Result<EmployeeRecord, DirectoryError> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownEmployee(id.to_string()))
    }

    fn active_employees(&self) -> Result<Vec<EmployeeRecord>, DirectoryError> {
        let mut active: Vec<EmployeeRecord> = self
            .records
            .read()
            .values()
            .filter(|record| record.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }
}
