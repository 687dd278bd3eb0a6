use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ParseSortKeyError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub String);

impl PatientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for PatientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One row of the outreach list as returned by `GET /api/patients`.
///
/// Everything except `patient_id` is optional; the backend passes through
/// whatever the upstream table holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: PatientId,
    #[serde(default, deserialize_with = "lenient_text")]
    pub first: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub last: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub dob: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub procedure_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub surgery_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
}

impl Patient {
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: PatientId(patient_id.into()),
            ..Self::default()
        }
    }

    /// A blank phone counts as missing.
    pub fn has_phone(&self) -> bool {
        self.phone
            .as_deref()
            .is_some_and(|phone| !phone.trim().is_empty())
    }

    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first.as_deref().unwrap_or_default(),
            self.last.as_deref().unwrap_or_default()
        )
    }

    pub fn field(&self, key: SortKey) -> Option<&str> {
        match key {
            SortKey::PatientId => Some(self.patient_id.as_str()),
            SortKey::First => self.first.as_deref(),
            SortKey::Last => self.last.as_deref(),
            SortKey::Dob => self.dob.as_deref(),
            SortKey::ProcedureDate => self.procedure_date.as_deref(),
        }
    }
}

/// Upstream tables sometimes hold numbers where text is expected (phone
/// numbers, numeric names). Scalars become text; anything else is dropped.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    PatientId,
    First,
    Last,
    Dob,
    ProcedureDate,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::PatientId,
        SortKey::First,
        SortKey::Last,
        SortKey::Dob,
        SortKey::ProcedureDate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::PatientId => "patient_id",
            SortKey::First => "first",
            SortKey::Last => "last",
            SortKey::Dob => "dob",
            SortKey::ProcedureDate => "procedure_date",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::PatientId => "ID",
            SortKey::First => "First",
            SortKey::Last => "Last",
            SortKey::Dob => "DoB",
            SortKey::ProcedureDate => "Procedure",
        }
    }

    pub fn is_date(self) -> bool {
        matches!(self, SortKey::Dob | SortKey::ProcedureDate)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| ParseSortKeyError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => f.write_str("asc"),
            SortDirection::Descending => f.write_str("desc"),
        }
    }
}
