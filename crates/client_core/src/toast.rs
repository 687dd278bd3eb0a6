use std::fmt;

use shared::domain::Patient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastKind {
    Info,
    Ok,
    Warn,
    Err,
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToastKind::Info => "info",
            ToastKind::Ok => "ok",
            ToastKind::Warn => "warn",
            ToastKind::Err => "err",
        };
        f.write_str(label)
    }
}

/// Transient status line. At most one is visible; a newer one replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl Toast {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn starting_call(patient: &Patient) -> Self {
        Self::new(
            ToastKind::Info,
            format!("Starting call for {}…", patient.display_name()),
        )
    }

    pub fn call_sent() -> Self {
        Self::new(ToastKind::Ok, "Sent to workflow. Check workflow executions.")
    }

    pub fn call_rejected(status: &str) -> Self {
        Self::new(
            ToastKind::Warn,
            format!("Backend responded but not OK: {status}"),
        )
    }

    pub fn call_failed(reason: &str) -> Self {
        Self::new(ToastKind::Err, reason)
    }

    pub fn load_failed(reason: &str) -> Self {
        Self::new(ToastKind::Err, format!("Failed to load patients: {reason}"))
    }

    pub fn fallback_posted() -> Self {
        Self::new(ToastKind::Ok, "Posted to workflow webhook (fallback).")
    }
}

impl fmt::Display for Toast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
