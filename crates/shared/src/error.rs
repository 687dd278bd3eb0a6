use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error body produced by the backend when a route fails (`{"detail": ...}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl BackendErrorBody {
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort key '{0}' (expected patient_id, first, last, dob or procedure_date)")]
pub struct ParseSortKeyError(pub String);
