use reqwest::Client;
use shared::{domain::PatientId, protocol::WebhookEnvelope};
use tracing::{debug, info};
use url::Url;

use crate::{config::Settings, error::RequestError};

/// What happened to a best-effort webhook post. Never shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDelivery {
    Delivered,
    Dropped,
}

/// Direct post to the workflow endpoint, bypassing the backend. Diagnostic only.
#[derive(Clone)]
pub struct FallbackWebhook {
    http: Client,
    url: Url,
    source: String,
}

impl FallbackWebhook {
    /// `Ok(None)` when no fallback url is configured.
    pub fn from_settings(http: Client, settings: &Settings) -> Result<Option<Self>, RequestError> {
        Ok(settings.fallback_endpoint()?.map(|url| Self {
            http,
            url,
            source: settings.webhook_source.clone(),
        }))
    }

    pub fn envelope(&self, patient_id: PatientId) -> WebhookEnvelope {
        WebhookEnvelope::start_call(self.source.clone(), patient_id)
    }

    /// Posts the start-call envelope. Failures are logged and swallowed.
    pub async fn post_best_effort(&self, patient_id: PatientId) -> WebhookDelivery {
        match self.post(patient_id.clone()).await {
            Ok(()) => {
                info!(patient_id = %patient_id, "fallback webhook accepted start_call");
                WebhookDelivery::Delivered
            }
            Err(err) => {
                debug!(patient_id = %patient_id, %err, "fallback webhook delivery dropped");
                WebhookDelivery::Dropped
            }
        }
    }

    async fn post(&self, patient_id: PatientId) -> Result<(), RequestError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(&self.envelope(patient_id))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RequestError::WebhookStatus(status))
        }
    }
}
