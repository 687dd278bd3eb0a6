use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{domain::PatientId, error::BackendErrorBody};

pub const START_CALL_EVENT: &str = "start_call";

/// `POST /api/start` request body. Optional form fields are omitted when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCallRequest {
    pub patient_id: PatientId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surgery_type: Option<String>,
}

impl StartCallRequest {
    pub fn for_patient(patient_id: PatientId) -> Self {
        Self {
            patient_id,
            name: None,
            phone: None,
            language: None,
            surgery_type: None,
        }
    }
}

/// `POST /api/start` response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartCallResponse {
    #[serde(default)]
    pub ok: bool,
    /// Either backend status text or the workflow endpoint's HTTP status code.
    #[serde(default)]
    pub status: Option<Value>,
    /// Upstream record id; passed through untouched.
    #[serde(default)]
    pub airtable_id: Option<Value>,
    /// Workflow endpoint reply when it did not succeed; any JSON shape.
    #[serde(default)]
    pub n8n: Option<Value>,
    /// Present when the route itself failed (`{"detail": ...}`).
    #[serde(flatten)]
    pub error: BackendErrorBody,
}

impl StartCallResponse {
    pub fn status_text(&self) -> Option<String> {
        match self.status.as_ref()? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Status text, else the route's error detail.
    pub fn failure_text(&self) -> Option<String> {
        self.status_text().or_else(|| self.error.detail_text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub patient_id: PatientId,
}

/// Envelope posted directly to the fallback webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub source: String,
    pub event: String,
    pub payload: WebhookPayload,
}

impl WebhookEnvelope {
    pub fn start_call(source: impl Into<String>, patient_id: PatientId) -> Self {
        Self {
            source: source.into(),
            event: START_CALL_EVENT.to_string(),
            payload: WebhookPayload { patient_id },
        }
    }
}
