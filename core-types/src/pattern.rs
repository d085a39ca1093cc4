use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MIN_WEEKLY_DAYS: u8 = 1;
pub const MAX_WEEKLY_DAYS: u8 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("weekly day count {0} outside supported range {MIN_WEEKLY_DAYS}..={MAX_WEEKLY_DAYS}")]
    WeeklyDaysOutOfRange(u8),
    #[error("unknown employment pattern label: {0}")]
    UnknownLabel(String),
}

/// Employment pattern the grant tables are keyed on. Part-time employees
/// carry their contracted working days per week (1..=4); anything at five or
/// more days is the full-time pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmploymentPattern {
    FullTime,
    PartTime { weekly_days: u8 },
}

impl EmploymentPattern {
    pub fn part_time(weekly_days: u8) -> Result<Self, PatternError> {
        if !(MIN_WEEKLY_DAYS..=MAX_WEEKLY_DAYS).contains(&weekly_days) {
            return Err(PatternError::WeeklyDaysOutOfRange(weekly_days));
        }
        Ok(EmploymentPattern::PartTime { weekly_days })
    }

    pub fn weekly_days(&self) -> Option<u8> {
        match self {
            EmploymentPattern::FullTime => None,
            EmploymentPattern::PartTime { weekly_days } => Some(*weekly_days),
        }
    }

    /// Legacy display label used by upstream HR exports ("A", "B-1".."B-4").
    pub fn label(&self) -> String {
        match self {
            EmploymentPattern::FullTime => "A".to_string(),
            EmploymentPattern::PartTime { weekly_days } => format!("B-{weekly_days}"),
        }
    }

    pub fn from_label(label: &str) -> Result<Self, PatternError> {
        let trimmed = label.trim();
        if trimmed == "A" {
            return Ok(EmploymentPattern::FullTime);
        }
        if let Some(rest) = trimmed.strip_prefix("B-") {
            let weekly_days: u8 = rest
                .parse()
                .map_err(|_| PatternError::UnknownLabel(label.to_string()))?;
            return Self::part_time(weekly_days);
        }
        Err(PatternError::UnknownLabel(label.to_string()))
    }

    /// Re-check range bounds after deserializing from an external document.
    pub fn validate(&self) -> Result<(), PatternError> {
        match self {
            EmploymentPattern::FullTime => Ok(()),
            EmploymentPattern::PartTime { weekly_days } => {
                Self::part_time(*weekly_days).map(|_| ())
            }
        }
    }
}

impl fmt::Display for EmploymentPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for EmploymentPattern {
    type Err = PatternError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_label(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for label in ["A", "B-1", "B-2", "B-3", "B-4"] {
            let pattern = EmploymentPattern::from_label(label).unwrap();
            assert_eq!(pattern.label(), label);
        }
    }

    #[test]
    fn part_time_range_enforced() {
        assert_eq!(
            EmploymentPattern::part_time(0),
            Err(PatternError::WeeklyDaysOutOfRange(0))
        );
        assert_eq!(
            EmploymentPattern::part_time(5),
            Err(PatternError::WeeklyDaysOutOfRange(5))
        );
        assert!(EmploymentPattern::from_label("B-5").is_err());
    }

    #[test]
    fn unknown_labels_rejected() {
        assert!(matches!(
            EmploymentPattern::from_label("C"),
            Err(PatternError::UnknownLabel(_))
        ));
        assert!(EmploymentPattern::from_label("B-").is_err());
    }

    #[test]
    fn weekly_days_exposed_for_part_time_only() {
        assert_eq!(EmploymentPattern::FullTime.weekly_days(), None);
        let pattern = EmploymentPattern::part_time(3).unwrap();
        assert_eq!(pattern.weekly_days(), Some(3));
    }
}
