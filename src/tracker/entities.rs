use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Threshold a fresh profile starts with and the one restored by a full reset.
pub const DEFAULT_MIN_ATTENDANCE: u8 = 75;

/// Stable identifier of a subject. Drawn from the store sequence, never from the clock.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

impl Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for SubjectId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('#').parse().map(SubjectId)
    }
}

/// A subject as it is kept in the store and on disk.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct SubjectRecord {
    pub id: SubjectId,
    pub code: String,
    pub name: String,
    pub present: u32,
    pub total: u32,
}

impl SubjectRecord {
    pub fn absent(&self) -> u32 {
        self.total.saturating_sub(self.present)
    }
}

/// A subject that hasn't been given an id yet. Produced by manual entry and by image import.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct SubjectDraft {
    pub code: String,
    pub name: String,
    pub present: u32,
    pub total: u32,
}

impl SubjectDraft {
    pub fn new(code: impl Into<String>, name: impl Into<String>, present: u32, total: u32) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            present,
            total,
        }
    }

    /// Trims labels and checks the record invariants. Nothing is clamped.
    pub fn validate(self) -> Result<SubjectDraft, ValidationError> {
        let code = non_empty("code", self.code)?;
        let name = non_empty("name", self.name)?;
        check_counts(self.present, self.total)?;
        Ok(SubjectDraft {
            code,
            name,
            present: self.present,
            total: self.total,
        })
    }

    pub(crate) fn into_record(self, id: SubjectId) -> SubjectRecord {
        SubjectRecord {
            id,
            code: self.code,
            name: self.name,
            present: self.present,
            total: self.total,
        }
    }
}

/// Partial edit of a subject. Fields left as `None` keep their current value.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct SubjectUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub present: Option<u32>,
    pub total: Option<u32>,
}

impl SubjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.name.is_none() && self.present.is_none() && self.total.is_none()
    }

    /// Produces the edited record without touching `record`, so a rejected edit leaves no trace.
    pub(crate) fn apply_to(&self, record: &SubjectRecord) -> Result<SubjectRecord, ValidationError> {
        let draft = SubjectDraft {
            code: self.code.clone().unwrap_or_else(|| record.code.clone()),
            name: self.name.clone().unwrap_or_else(|| record.name.clone()),
            present: self.present.unwrap_or(record.present),
            total: self.total.unwrap_or(record.total),
        }
        .validate()?;
        Ok(draft.into_record(record.id))
    }
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub min_attendance: u8,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            min_attendance: DEFAULT_MIN_ATTENDANCE,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("subject {0} can't be empty")]
    EmptyField(&'static str),
    #[error("attended classes ({present}) can't be more than total classes ({total})")]
    PresentExceedsTotal { present: u32, total: u32 },
    #[error("{field} can't be negative, got {value}")]
    NegativeCount { field: &'static str, value: i64 },
    #[error("{field} is too large, got {value}")]
    CountOverflow { field: &'static str, value: String },
    #[error("{field} must be a whole number, got {value}")]
    FractionalCount { field: &'static str, value: String },
    #[error("minimum attendance must be between 0 and 100, got {0}")]
    ThresholdOutOfRange(i64),
}

fn non_empty(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn check_counts(present: u32, total: u32) -> Result<(), ValidationError> {
    if present > total {
        Err(ValidationError::PresentExceedsTotal { present, total })
    } else {
        Ok(())
    }
}

/// Converts a signed count coming from an untrusted source.
pub fn count_from_signed(field: &'static str, value: i64) -> Result<u32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeCount { field, value });
    }
    u32::try_from(value).map_err(|_| ValidationError::CountOverflow {
        field,
        value: value.to_string(),
    })
}
