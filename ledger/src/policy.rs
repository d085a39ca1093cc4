//! Versioned accrual policy documents and the store that holds them.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use core_types::{types::is_half_step, Days, EmploymentPattern};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::rounding::{RoundingMode, RoundingRule};
use crate::schedule::{add_months, add_years};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaselineRule {
    /// First grant at join date + offset, then every `grant_cycle_months`.
    RelativeFromJoin { initial_offset_months: u32 },
    /// Every join-date anniversary, shifted by an offset.
    Anniversary { offset_months: u32 },
    /// Company-wide fixed annual grant date; dates before the join date are
    /// skipped.
    FixedMonthDay { month: u32, day: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpiryRule {
    Years { years: u32 },
    Months { months: u32 },
}

impl ExpiryRule {
    /// Last day a lot granted on `grant_date` is usable: the day before the
    /// offset anniversary.
    pub fn expiry_for(&self, grant_date: NaiveDate) -> NaiveDate {
        let boundary = match self {
            ExpiryRule::Years { years } => add_years(grant_date, *years as i32),
            ExpiryRule::Months { months } => add_months(grant_date, *months as i32),
        };
        boundary.pred_opt().unwrap_or(boundary)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrantRow {
    pub tenure_years: f64,
    pub days: Days,
}

pub type GrantTable = Vec<GrantRow>;

/// Floor lookup: the row with the largest threshold not above `tenure_years`,
/// or zero days when the tenure is below every row.
pub fn lookup_days(table: &[GrantRow], tenure_years: f64) -> Days {
    table
        .iter()
        .take_while(|row| row.tenure_years <= tenure_years)
        .last()
        .map(|row| row.days)
        .unwrap_or(0.0)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertCheckpoint {
    /// Months before the next grant date the checkpoint becomes due.
    pub months_before: u32,
    pub min_consumed_days: Days,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub checkpoints: Vec<AlertCheckpoint>,
    /// Only employees whose latest grant reached this size are checked.
    pub min_grant_days_for_alert: Days,
}

/// Immutable accrual policy snapshot. Published versions are never edited;
/// policy changes ship as a new version that is then activated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub version: String,
    pub baseline: BaselineRule,
    pub grant_cycle_months: u32,
    pub expiry: ExpiryRule,
    pub rounding: RoundingRule,
    pub min_legal_use_days: Days,
    pub full_time: GrantTable,
    /// Weekly working days (1..=4) to that pattern's grant table.
    pub part_time: BTreeMap<u8, GrantTable>,
    pub alert: AlertRule,
}

impl PolicyConfig {
    /// Fallback policy used when no version was ever published.
    pub fn built_in() -> Self {
        let part_time_table = vec![
            GrantRow {
                tenure_years: 0.5,
                days: 7.0,
            },
            GrantRow {
                tenure_years: 1.5,
                days: 8.0,
            },
            GrantRow {
                tenure_years: 2.5,
                days: 9.0,
            },
        ];
        Self {
            version: "1.0.0".to_string(),
            baseline: BaselineRule::RelativeFromJoin {
                initial_offset_months: 6,
            },
            grant_cycle_months: 12,
            expiry: ExpiryRule::Years { years: 2 },
            rounding: RoundingRule::Day {
                mode: RoundingMode::Round,
            },
            min_legal_use_days: 5.0,
            full_time: vec![
                GrantRow {
                    tenure_years: 0.5,
                    days: 10.0,
                },
                GrantRow {
                    tenure_years: 1.5,
                    days: 11.0,
                },
                GrantRow {
                    tenure_years: 2.5,
                    days: 12.0,
                },
                GrantRow {
                    tenure_years: 3.5,
                    days: 14.0,
                },
                GrantRow {
                    tenure_years: 4.5,
                    days: 16.0,
                },
                GrantRow {
                    tenure_years: 5.5,
                    days: 18.0,
                },
                GrantRow {
                    tenure_years: 6.5,
                    days: 20.0,
                },
            ],
            part_time: (1u8..=4)
                .map(|days| (days, part_time_table.clone()))
                .collect(),
            alert: AlertRule {
                checkpoints: vec![
                    AlertCheckpoint {
                        months_before: 3,
                        min_consumed_days: 5.0,
                    },
                    AlertCheckpoint {
                        months_before: 2,
                        min_consumed_days: 3.0,
                    },
                    AlertCheckpoint {
                        months_before: 1,
                        min_consumed_days: 5.0,
                    },
                ],
                min_grant_days_for_alert: 10.0,
            },
        }
    }

    pub fn table_for(&self, pattern: &EmploymentPattern) -> &[GrantRow] {
        match pattern {
            EmploymentPattern::FullTime => &self.full_time,
            EmploymentPattern::PartTime { weekly_days } => self
                .part_time
                .get(weekly_days)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    pub fn grant_days(&self, pattern: &EmploymentPattern, tenure_years: f64) -> Days {
        lookup_days(self.table_for(pattern), tenure_years)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return invalid("version must not be empty");
        }
        if self.grant_cycle_months == 0 {
            return invalid("grant cycle must be at least one month");
        }
        if self.full_time.is_empty() {
            return invalid("full-time grant table must not be empty");
        }
        validate_table("full-time", &self.full_time)?;
        for (weekly_days, table) in &self.part_time {
            if !(1..=4).contains(weekly_days) {
                return invalid(&format!(
                    "part-time weekly day key {weekly_days} outside 1..=4"
                ));
            }
            validate_table(&format!("part-time B-{weekly_days}"), table)?;
        }
        if let BaselineRule::FixedMonthDay { month, day } = self.baseline {
            // Checked against a non-leap year so the anchor exists every year.
            if NaiveDate::from_ymd_opt(2001, month, day).is_none() {
                return invalid(&format!("fixed grant date {month}-{day} is not a valid day"));
            }
        }
        match self.expiry {
            ExpiryRule::Years { years } if years == 0 => {
                return invalid("expiry must be at least one year")
            }
            ExpiryRule::Months { months } if months == 0 => {
                return invalid("expiry must be at least one month")
            }
            _ => {}
        }
        if !is_half_step(self.min_legal_use_days) {
            return invalid("min legal use days must be a half-day multiple");
        }
        Ok(())
    }
}

fn validate_table(label: &str, table: &[GrantRow]) -> Result<()> {
    let mut previous: Option<f64> = None;
    for row in table {
        if !is_half_step(row.tenure_years) {
            return invalid(&format!(
                "{label} table: tenure key {} is not a half-year step",
                row.tenure_years
            ));
        }
        if !is_half_step(row.days) {
            return invalid(&format!(
                "{label} table: grant of {} days is not a half-day multiple",
                row.days
            ));
        }
        if let Some(prev) = previous {
            if row.tenure_years <= prev {
                return invalid(&format!(
                    "{label} table: tenure keys must be strictly ascending"
                ));
            }
        }
        previous = Some(row.tenure_years);
    }
    Ok(())
}

fn invalid(reason: &str) -> Result<()> {
    Err(LedgerError::InvalidPolicy {
        reason: reason.to_string(),
    })
}

#[derive(Serialize, Deserialize, Default)]
struct PolicyStoreFile {
    policies: Vec<PolicyConfig>,
    active: Option<String>,
}

/// Versioned policy documents backed by a simple json file. The single
/// `active` marker makes activation atomic for readers: swapping it can
/// never expose zero or multiple active versions.
pub struct PolicyStore {
    versions: BTreeMap<String, PolicyConfig>,
    active: Option<String>,
    path: Option<PathBuf>,
}

impl PolicyStore {
    pub fn in_memory() -> Self {
        Self {
            versions: BTreeMap::new(),
            active: None,
            path: None,
        }
    }

    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self {
            versions: BTreeMap::new(),
            active: None,
            path: Some(path.clone()),
        };
        if path.exists() {
            let bytes = fs::read(&path)?;
            if !bytes.is_empty() {
                let file: PolicyStoreFile = serde_json::from_slice(&bytes)?;
                for policy in file.policies {
                    policy.validate()?;
                    store.versions.insert(policy.version.clone(), policy);
                }
                if let Some(active) = file.active {
                    if !store.versions.contains_key(&active) {
                        return Err(LedgerError::PolicyNotFound { version: active });
                    }
                    store.active = Some(active);
                }
            }
        }
        Ok(store)
    }

    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = PolicyStoreFile {
            policies: self.versions.values().cloned().collect(),
            active: self.active.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Upsert a policy draft. Never touches the active marker.
    pub fn save(&mut self, policy: PolicyConfig) -> Result<()> {
        policy.validate()?;
        self.versions.insert(policy.version.clone(), policy);
        self.persist()
    }

    /// Make `version` the single active policy.
    pub fn activate(&mut self, version: &str) -> Result<()> {
        if !self.versions.contains_key(version) {
            return Err(LedgerError::PolicyNotFound {
                version: version.to_string(),
            });
        }
        self.active = Some(version.to_string());
        self.persist()
    }

    /// Resolve a policy: the requested version, else the active version,
    /// else the built-in fallback. An explicit version that does not exist
    /// is an error.
    pub fn load(&self, version: Option<&str>) -> Result<PolicyConfig> {
        if let Some(version) = version {
            return self
                .versions
                .get(version)
                .cloned()
                .ok_or_else(|| LedgerError::PolicyNotFound {
                    version: version.to_string(),
                });
        }
        if let Some(active) = &self.active {
            if let Some(policy) = self.versions.get(active) {
                return Ok(policy.clone());
            }
        }
        Ok(PolicyConfig::built_in())
    }

    pub fn active_version(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn lookup_takes_the_floor_row() {
        let table = PolicyConfig::built_in().full_time;
        assert_eq!(lookup_days(&table, 0.0), 0.0);
        assert_eq!(lookup_days(&table, 0.5), 10.0);
        assert_eq!(lookup_days(&table, 1.0), 10.0);
        assert_eq!(lookup_days(&table, 3.5), 14.0);
        assert_eq!(lookup_days(&table, 12.0), 20.0);
    }

    #[test]
    fn expiry_is_the_day_before_the_anniversary() {
        let rule = ExpiryRule::Years { years: 2 };
        assert_eq!(rule.expiry_for(date(2023, 8, 2)), date(2025, 8, 1));
        let rule = ExpiryRule::Months { months: 18 };
        assert_eq!(rule.expiry_for(date(2023, 8, 2)), date(2025, 2, 1));
    }

    #[test]
    fn built_in_policy_is_valid() {
        PolicyConfig::built_in().validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_documents() {
        let mut policy = PolicyConfig::built_in();
        policy.version = "  ".to_string();
        assert!(policy.validate().is_err());

        let mut policy = PolicyConfig::built_in();
        policy.grant_cycle_months = 0;
        assert!(policy.validate().is_err());

        let mut policy = PolicyConfig::built_in();
        policy.full_time[1].tenure_years = 0.5;
        assert!(policy.validate().is_err());

        let mut policy = PolicyConfig::built_in();
        policy.full_time[0].days = 10.3;
        assert!(policy.validate().is_err());

        let mut policy = PolicyConfig::built_in();
        policy.part_time.insert(7, vec![]);
        assert!(policy.validate().is_err());

        let mut policy = PolicyConfig::built_in();
        policy.baseline = BaselineRule::FixedMonthDay { month: 2, day: 30 };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn load_falls_back_active_then_built_in() {
        let mut store = PolicyStore::in_memory();
        assert_eq!(store.load(None).unwrap().version, "1.0.0");

        let mut v2 = PolicyConfig::built_in();
        v2.version = "2.0.0".to_string();
        v2.full_time[0].days = 12.0;
        store.save(v2).unwrap();
        // Saved but not activated: still the built-in fallback.
        assert_eq!(store.load(None).unwrap().version, "1.0.0");

        store.activate("2.0.0").unwrap();
        let active = store.load(None).unwrap();
        assert_eq!(active.version, "2.0.0");
        assert_eq!(active.full_time[0].days, 12.0);

        assert!(matches!(
            store.load(Some("9.9.9")),
            Err(LedgerError::PolicyNotFound { .. })
        ));
        assert!(matches!(
            store.activate("9.9.9"),
            Err(LedgerError::PolicyNotFound { .. })
        ));
    }

    #[test]
    fn activation_swaps_the_single_marker() {
        let mut store = PolicyStore::in_memory();
        let mut v1 = PolicyConfig::built_in();
        v1.version = "v1".to_string();
        let mut v2 = PolicyConfig::built_in();
        v2.version = "v2".to_string();
        store.save(v1).unwrap();
        store.save(v2).unwrap();

        store.activate("v1").unwrap();
        assert_eq!(store.active_version(), Some("v1"));
        store.activate("v2").unwrap();
        assert_eq!(store.active_version(), Some("v2"));
    }

    #[test]
    fn policy_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policies.json");

        let mut store = PolicyStore::load_or_init(&path).unwrap();
        let mut v2 = PolicyConfig::built_in();
        v2.version = "2024-04".to_string();
        store.save(v2).unwrap();
        store.activate("2024-04").unwrap();

        let reloaded = PolicyStore::load_or_init(&path).unwrap();
        assert_eq!(reloaded.active_version(), Some("2024-04"));
        assert_eq!(reloaded.load(None).unwrap().version, "2024-04");
    }
}
