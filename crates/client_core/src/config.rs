use std::{collections::HashMap, fs, path::Path, time::Duration};

use url::Url;

use crate::error::RequestError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_WEBHOOK_SOURCE: &str = "medrec-voice-starter";
pub const SETTINGS_FILE: &str = "outreach.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: String,
    /// Direct workflow endpoint used by the diagnostic trigger. `None` hides it.
    pub fallback_webhook_url: Option<String>,
    pub webhook_source: String,
    pub toast_ttl: Duration,
    pub fallback_toast_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.into(),
            fallback_webhook_url: None,
            webhook_source: DEFAULT_WEBHOOK_SOURCE.into(),
            toast_ttl: Duration::from_millis(3200),
            fallback_toast_ttl: Duration::from_millis(3000),
        }
    }
}

impl Settings {
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = normalize_base_url(&url.into());
        self
    }

    pub fn with_fallback_webhook_url(mut self, url: Option<String>) -> Self {
        self.fallback_webhook_url = url.and_then(non_empty);
        self
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback_webhook_url.is_some()
    }

    /// Joins `path` onto the backend base url.
    pub fn endpoint(&self, path: &str) -> Result<Url, RequestError> {
        let raw = format!("{}/{}", self.backend_url, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|source| RequestError::InvalidUrl { url: raw, source })
    }

    pub fn fallback_endpoint(&self) -> Result<Option<Url>, RequestError> {
        self.fallback_webhook_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|source| RequestError::InvalidUrl {
                    url: raw.to_string(),
                    source,
                })
            })
            .transpose()
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the flat settings file, then environment variables.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, &file_cfg),
            Err(err) => tracing::warn!(path = %path.display(), %err, "ignoring unreadable settings file"),
        }
    }

    if let Some(v) = env("BACKEND_URL").and_then(non_empty) {
        settings.backend_url = normalize_base_url(&v);
    }
    if let Some(v) = env("APP__BACKEND_URL").and_then(non_empty) {
        settings.backend_url = normalize_base_url(&v);
    }

    if let Some(v) = env("N8N_WEBHOOK_URL") {
        settings.fallback_webhook_url = non_empty(v);
    }
    if let Some(v) = env("APP__FALLBACK_WEBHOOK_URL") {
        settings.fallback_webhook_url = non_empty(v);
    }

    if let Some(v) = env("APP__WEBHOOK_SOURCE").and_then(non_empty) {
        settings.webhook_source = v;
    }

    if let Some(ms) = env("APP__TOAST_TTL_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
        settings.toast_ttl = Duration::from_millis(ms);
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, toml::Value>) {
    if let Some(v) = file_cfg.get("backend_url").and_then(|v| v.as_str()) {
        if let Some(v) = non_empty(v.to_string()) {
            settings.backend_url = normalize_base_url(&v);
        }
    }
    if let Some(v) = file_cfg.get("fallback_webhook_url").and_then(|v| v.as_str()) {
        settings.fallback_webhook_url = non_empty(v.to_string());
    }
    if let Some(v) = file_cfg.get("webhook_source").and_then(|v| v.as_str()) {
        if let Some(v) = non_empty(v.to_string()) {
            settings.webhook_source = v;
        }
    }
    if let Some(ms) = file_cfg.get("toast_ttl_ms").and_then(|v| v.as_integer()) {
        settings.toast_ttl = Duration::from_millis(ms.max(0) as u64);
    }
    if let Some(ms) = file_cfg.get("fallback_toast_ttl_ms").and_then(|v| v.as_integer()) {
        settings.fallback_toast_ttl = Duration::from_millis(ms.max(0) as u64);
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_BACKEND_URL.to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
