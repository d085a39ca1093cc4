//! In-memory grant-lot and consumption book.
//!
//! One book per employee behind a single `RwLock`; every multi-row mutation
//! (upsert, multi-lot debit, reversal, recalc) happens under one write-lock
//! acquisition, so a failed operation leaves no partial state. Callers that
//! need read-modify-write across calls (the controller) serialize per
//! employee on top of this.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::NaiveDate;
use core_types::{Days, EmployeeId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::lot::{Consumption, GrantLot, LotId};

#[derive(Default)]
struct EmployeeBook {
    lots: Vec<GrantLot>,
    consumptions: Vec<Consumption>,
}

impl EmployeeBook {
    fn consumed_for_lot(&self, lot_id: LotId) -> Days {
        self.consumptions
            .iter()
            .filter(|c| c.lot_id == lot_id)
            .map(|c| c.days_used)
            .sum()
    }

    fn lot_mut(&mut self, lot_id: LotId) -> Option<&mut GrantLot> {
        self.lots.iter_mut().find(|lot| lot.id == lot_id)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum LotUpsert {
    Created(LotId),
    Updated(LotId),
    Unchanged(LotId),
}

#[derive(Serialize, Deserialize, Default)]
struct LedgerFile {
    next_lot_id: u64,
    next_consumption_id: u64,
    lots: Vec<GrantLot>,
    consumptions: Vec<Consumption>,
}

pub struct LedgerStore {
    books: RwLock<HashMap<EmployeeId, EmployeeBook>>,
    next_lot_id: AtomicU64,
    next_consumption_id: AtomicU64,
    path: Option<PathBuf>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            next_lot_id: AtomicU64::new(1),
            next_consumption_id: AtomicU64::new(1),
            path: None,
        }
    }

    /// Open a json-file-backed book, tolerating a missing file.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self::new();
        store.path = Some(path.clone());
        if path.exists() {
            let bytes = fs::read(&path)?;
            if !bytes.is_empty() {
                let file: LedgerFile = serde_json::from_slice(&bytes)?;
                let mut books: HashMap<EmployeeId, EmployeeBook> = HashMap::new();
                for lot in file.lots {
                    books.entry(lot.employee_id.clone()).or_default().lots.push(lot);
                }
                for consumption in file.consumptions {
                    books
                        .entry(consumption.employee_id.clone())
                        .or_default()
                        .consumptions
                        .push(consumption);
                }
                store.books = RwLock::new(books);
                store.next_lot_id = AtomicU64::new(file.next_lot_id.max(1));
                store.next_consumption_id = AtomicU64::new(file.next_consumption_id.max(1));
            }
        }
        Ok(store)
    }

    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let books = self.books.read();
        let mut ids: Vec<&EmployeeId> = books.keys().collect();
        ids.sort();
        let mut lots = Vec::new();
        let mut consumptions = Vec::new();
        for id in ids {
            let book = &books[id];
            lots.extend(book.lots.iter().cloned());
            consumptions.extend(book.consumptions.iter().cloned());
        }
        let file = LedgerFile {
            next_lot_id: self.next_lot_id.load(Ordering::Relaxed),
            next_consumption_id: self.next_consumption_id.load(Ordering::Relaxed),
            lots,
            consumptions,
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Employees with at least one lot, in stable order.
    pub fn employees(&self) -> Vec<EmployeeId> {
        let mut ids: Vec<EmployeeId> = self.books.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All lots for an employee, ascending by grant date.
    pub fn lots_for(&self, employee_id: &str) -> Vec<GrantLot> {
        let books = self.books.read();
        let mut lots = books
            .get(employee_id)
            .map(|book| book.lots.clone())
            .unwrap_or_default();
        lots.sort_by_key(|lot| lot.grant_date);
        lots
    }

    pub fn consumptions_for(&self, employee_id: &str) -> Vec<Consumption> {
        self.books
            .read()
            .get(employee_id)
            .map(|book| book.consumptions.clone())
            .unwrap_or_default()
    }

    pub fn consumptions_for_request(&self, employee_id: &str, request_id: &str) -> Vec<Consumption> {
        self.books
            .read()
            .get(employee_id)
            .map(|book| {
                book.consumptions
                    .iter()
                    .filter(|c| c.request_id == request_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn consumed_for_lot(&self, employee_id: &str, lot_id: LotId) -> Days {
        self.books
            .read()
            .get(employee_id)
            .map(|book| book.consumed_for_lot(lot_id))
            .unwrap_or(0.0)
    }

    /// Create or correct the lot for `(employee_id, grant_date)`.
    ///
    /// A missing lot is created with a full balance. An existing lot whose
    /// granted amount differs (the policy table changed since creation) gets
    /// `days_granted` replaced and `days_remaining` re-derived from its
    /// consumption rows, never below zero. Anything else is a no-op, which
    /// is what makes repeated generation idempotent. More than one existing
    /// lot on the grant date means reconciliation was skipped; the upsert
    /// refuses to guess which one to touch.
    pub fn upsert_lot(
        &self,
        employee_id: &str,
        grant_date: NaiveDate,
        days_granted: Days,
        expiry_date: NaiveDate,
        policy_version: &str,
    ) -> Result<LotUpsert> {
        let mut books = self.books.write();
        let book = books.entry(employee_id.to_string()).or_default();
        let matches: Vec<usize> = book
            .lots
            .iter()
            .enumerate()
            .filter(|(_, lot)| lot.grant_date == grant_date)
            .map(|(idx, _)| idx)
            .collect();
        if matches.len() > 1 {
            return Err(LedgerError::DuplicateGrant {
                employee_id: employee_id.to_string(),
                grant_date,
            });
        }
        if let Some(idx) = matches.first().copied() {
            let consumed = book.consumed_for_lot(book.lots[idx].id);
            let lot = &mut book.lots[idx];
            if lot.days_granted == days_granted {
                return Ok(LotUpsert::Unchanged(lot.id));
            }
            lot.days_granted = days_granted;
            lot.days_remaining = (days_granted - consumed).max(0.0);
            lot.expiry_date = expiry_date;
            lot.policy_version = policy_version.to_string();
            return Ok(LotUpsert::Updated(lot.id));
        }
        let id = self.next_lot_id.fetch_add(1, Ordering::Relaxed);
        book.lots.push(GrantLot {
            id,
            employee_id: employee_id.to_string(),
            grant_date,
            expiry_date,
            days_granted,
            days_remaining: days_granted,
            policy_version: policy_version.to_string(),
        });
        Ok(LotUpsert::Created(id))
    }

    /// Fold duplicate lots for the same grant date onto the one carrying the
    /// newest policy version. Consumption rows of superseded lots are
    /// re-pointed at the survivor (never discarded); lots are only removed
    /// once they hold no consumption rows. Returns the number of grant dates
    /// repaired.
    pub fn reconcile_duplicates(&self, employee_id: &str) -> usize {
        let mut books = self.books.write();
        let Some(book) = books.get_mut(employee_id) else {
            return 0;
        };
        let mut by_date: BTreeMap<NaiveDate, Vec<LotId>> = BTreeMap::new();
        for lot in &book.lots {
            by_date.entry(lot.grant_date).or_default().push(lot.id);
        }
        let mut repaired = 0;
        for ids in by_date.into_values() {
            if ids.len() < 2 {
                continue;
            }
            let mut candidates: Vec<(String, LotId)> = ids
                .iter()
                .map(|id| {
                    let version = book
                        .lots
                        .iter()
                        .find(|lot| lot.id == *id)
                        .expect("lot grouped above")
                        .policy_version
                        .clone();
                    (version, *id)
                })
                .collect();
            candidates.sort();
            let survivor = candidates.last().expect("duplicate group is non-empty").1;
            for consumption in &mut book.consumptions {
                if ids.contains(&consumption.lot_id) {
                    consumption.lot_id = survivor;
                }
            }
            book.lots
                .retain(|lot| lot.id == survivor || !ids.contains(&lot.id));
            let consumed = book.consumed_for_lot(survivor);
            if let Some(lot) = book.lot_mut(survivor) {
                lot.days_remaining = (lot.days_granted - consumed).clamp(0.0, lot.days_granted);
            }
            repaired += 1;
        }
        repaired
    }

    /// Apply a planned multi-lot debit as one atomic unit. Every debit must
    /// fit its lot's remaining balance or the whole commit is rejected.
    pub fn commit_consumption(
        &self,
        employee_id: &str,
        request_id: &str,
        date: NaiveDate,
        debits: &[(LotId, Days)],
    ) -> Result<Vec<Consumption>> {
        let mut books = self.books.write();
        let book = books
            .entry(employee_id.to_string())
            .or_default();
        for (lot_id, days) in debits {
            let Some(lot) = book.lots.iter().find(|lot| lot.id == *lot_id) else {
                return Err(LedgerError::UnknownLot {
                    employee_id: employee_id.to_string(),
                    lot_id: *lot_id,
                });
            };
            if lot.days_remaining < *days {
                return Err(LedgerError::InsufficientBalance {
                    employee_id: employee_id.to_string(),
                    requested: *days,
                    short: *days - lot.days_remaining,
                });
            }
        }
        let mut rows = Vec::with_capacity(debits.len());
        for (lot_id, days) in debits {
            let lot = book.lot_mut(*lot_id).expect("validated above");
            lot.days_remaining -= *days;
            let row = Consumption {
                id: self.next_consumption_id.fetch_add(1, Ordering::Relaxed),
                lot_id: *lot_id,
                employee_id: employee_id.to_string(),
                request_id: request_id.to_string(),
                date,
                days_used: *days,
            };
            book.consumptions.push(row.clone());
            rows.push(row);
        }
        Ok(rows)
    }

    /// Reverse every consumption row of a request: restore the exact amount
    /// onto each originating lot, then delete the rows. Restoring onto an
    /// already-expired lot is intentional; the next expiry pass reclaims it.
    pub fn remove_request(&self, employee_id: &str, request_id: &str) -> Result<Vec<Consumption>> {
        let mut books = self.books.write();
        let book = books
            .get_mut(employee_id)
            .ok_or_else(|| LedgerError::UnknownRequest {
                request_id: request_id.to_string(),
            })?;
        let removed: Vec<Consumption> = book
            .consumptions
            .iter()
            .filter(|c| c.request_id == request_id)
            .cloned()
            .collect();
        if removed.is_empty() {
            return Err(LedgerError::UnknownRequest {
                request_id: request_id.to_string(),
            });
        }
        for row in &removed {
            if let Some(lot) = book.lot_mut(row.lot_id) {
                lot.days_remaining += row.days_used;
            }
        }
        book.consumptions.retain(|c| c.request_id != request_id);
        Ok(removed)
    }

    /// Zero the balance of every lot expired before `as_of`. Returns the
    /// number of lots touched; a second pass on the same date touches none.
    pub fn expire_lots(&self, employee_id: &str, as_of: NaiveDate) -> usize {
        let mut books = self.books.write();
        let Some(book) = books.get_mut(employee_id) else {
            return 0;
        };
        let mut expired = 0;
        for lot in &mut book.lots {
            if lot.expired_before(as_of) && lot.days_remaining > 0.0 {
                lot.days_remaining = 0.0;
                expired += 1;
            }
        }
        expired
    }

    /// Rebuild every lot balance from first principles:
    /// `granted - consumed`, clamped to `[0, granted]`. Returns how many
    /// lots actually moved.
    pub fn rebuild_balances(&self, employee_id: &str) -> usize {
        let mut books = self.books.write();
        let Some(book) = books.get_mut(employee_id) else {
            return 0;
        };
        let consumed: Vec<(LotId, Days)> = book
            .lots
            .iter()
            .map(|lot| (lot.id, book.consumed_for_lot(lot.id)))
            .collect();
        let mut adjusted = 0;
        for (lot_id, used) in consumed {
            let lot = book.lot_mut(lot_id).expect("lot listed above");
            let expected = (lot.days_granted - used).clamp(0.0, lot.days_granted);
            if lot.days_remaining != expected {
                lot.days_remaining = expected;
                adjusted += 1;
            }
        }
        adjusted
    }

    /// Manual-edit escape hatch used by repair tooling and drift tests; the
    /// ordinary mutation paths keep the balance law by construction.
    pub fn override_remaining(&self, employee_id: &str, lot_id: LotId, days_remaining: Days) {
        let mut books = self.books.write();
        if let Some(lot) = books.get_mut(employee_id).and_then(|b| b.lot_mut(lot_id)) {
            lot.days_remaining = days_remaining;
        }
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}
