use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use shared::{
    domain::Patient,
    protocol::{StartCallRequest, StartCallResponse},
};
use tracing::{debug, warn};

use crate::{config::Settings, error::RequestError};

pub const PATIENTS_PATH: &str = "api/patients";
pub const START_CALL_PATH: &str = "api/start";

/// The two backend routes the controller depends on.
#[async_trait]
pub trait OutreachApi: Send + Sync {
    async fn list_patients(&self) -> Result<Vec<Patient>, RequestError>;
    async fn start_call(&self, request: &StartCallRequest)
        -> Result<StartCallResponse, RequestError>;
}

pub struct MissingOutreachApi;

#[async_trait]
impl OutreachApi for MissingOutreachApi {
    async fn list_patients(&self) -> Result<Vec<Patient>, RequestError> {
        Err(RequestError::Unconfigured)
    }

    async fn start_call(
        &self,
        _request: &StartCallRequest,
    ) -> Result<StartCallResponse, RequestError> {
        Err(RequestError::Unconfigured)
    }
}

pub struct HttpOutreachApi {
    http: Client,
    settings: Settings,
}

impl HttpOutreachApi {
    pub fn with_client(http: Client, settings: Settings) -> Self {
        Self { http, settings }
    }
}

#[async_trait]
impl OutreachApi for HttpOutreachApi {
    async fn list_patients(&self) -> Result<Vec<Patient>, RequestError> {
        let url = self.settings.endpoint(PATIENTS_PATH)?;
        let response = self.http.get(url).send().await?;
        let body = json_body(response).await?;
        Ok(patients_from_body(body))
    }

    async fn start_call(
        &self,
        request: &StartCallRequest,
    ) -> Result<StartCallResponse, RequestError> {
        let url = self.settings.endpoint(START_CALL_PATH)?;
        let response = self.http.post(url).json(request).send().await?;
        let status = response.status();
        let body = json_body(response).await?;
        serde_json::from_value(body)
            .map_err(|source| RequestError::UnexpectedShape { status, source })
    }
}

/// Reads a JSON body regardless of HTTP status; error routes still answer in JSON.
async fn json_body(response: Response) -> Result<Value, RequestError> {
    let status = response.status();
    if !status.is_success() {
        debug!(%status, url = %response.url(), "backend answered with non-success status");
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|source| RequestError::NotJson { status, source })
}

/// Extracts `items` from a list response. A missing or non-array list yields
/// no rows; entries that do not decode or lack an id are skipped.
pub fn patients_from_body(body: Value) -> Vec<Patient> {
    let Value::Object(mut fields) = body else {
        warn!("patient list response is not an object");
        return Vec::new();
    };
    let Some(Value::Array(items)) = fields.remove("items") else {
        warn!("patient list response has no items array");
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Patient>(item) {
            Ok(patient) if !patient.patient_id.as_str().is_empty() => Some(patient),
            Ok(_) => {
                warn!("skipping patient row without an id");
                None
            }
            Err(err) => {
                warn!(%err, "skipping malformed patient row");
                None
            }
        })
        .collect()
}
