use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the outreach backend and the fallback webhook.
///
/// Every variant ends up as toast text; `Display` is what the user reads.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned a non-JSON response ({status}): {source}")]
    NotJson {
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },
    #[error("backend returned unexpected JSON ({status}): {source}")]
    UnexpectedShape {
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid endpoint url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("fallback webhook responded with {0}")]
    WebhookStatus(StatusCode),
    #[error("outreach backend is not configured")]
    Unconfigured,
}
