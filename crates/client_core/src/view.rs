//! Presentation-ready snapshot of the controller state.

use shared::domain::{Patient, PatientId};

use crate::{sorting::SortState, toast::Toast};

pub const PLACEHOLDER_ROWS: usize = 6;
pub const MISSING: &str = "—";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientListView {
    pub loading: bool,
    /// Skeleton rows to draw while the initial fetch is pending.
    pub placeholder_rows: usize,
    pub total: usize,
    pub sort: SortState,
    pub rows: Vec<PatientRowView>,
    pub toast: Option<Toast>,
    pub fallback_enabled: bool,
}

impl PatientListView {
    pub fn is_empty(&self) -> bool {
        !self.loading && self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRowView {
    pub patient_id: PatientId,
    pub first: String,
    pub last: String,
    pub dob: String,
    pub procedure_date: String,
    pub busy: bool,
    pub call_enabled: bool,
    pub call_hint: &'static str,
}

impl PatientRowView {
    pub fn new(patient: &Patient, busy: bool) -> Self {
        Self {
            patient_id: patient.patient_id.clone(),
            first: display_text(patient.first.as_deref()),
            last: display_text(patient.last.as_deref()),
            dob: format_date(patient.dob.as_deref()),
            procedure_date: format_date(patient.procedure_date.as_deref()),
            busy,
            call_enabled: patient.has_phone() && !busy,
            call_hint: if patient.has_phone() {
                "Start call"
            } else {
                "No phone on file"
            },
        }
    }
}

fn display_text(value: Option<&str>) -> String {
    match value {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => MISSING.to_string(),
    }
}

/// `May 1, 2021` for parsable dates, the raw text otherwise.
pub fn format_date(raw: Option<&str>) -> String {
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return MISSING.to_string();
    };
    match crate::sorting::parse_date(raw) {
        Some(dt) => dt.format("%b %-d, %Y").to_string(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_dates_and_falls_back_to_raw_text() {
        assert_eq!(format_date(Some("2021-05-01")), "May 1, 2021");
        assert_eq!(format_date(Some("next week")), "next week");
        assert_eq!(format_date(None), MISSING);
        assert_eq!(format_date(Some("")), MISSING);
        assert_eq!(format_date(Some("May 1, 2021")), "May 1, 2021");
    }

    #[test]
    fn row_without_phone_is_not_callable() {
        let row = PatientRowView::new(&Patient::new("P1"), false);
        assert!(!row.call_enabled);
        assert_eq!(row.call_hint, "No phone on file");
        assert_eq!(row.first, MISSING);
    }

    #[test]
    fn busy_row_is_not_callable() {
        let patient = Patient {
            phone: Some("+15550100".into()),
            ..Patient::new("P1")
        };
        assert!(PatientRowView::new(&patient, false).call_enabled);
        assert!(!PatientRowView::new(&patient, true).call_enabled);
    }
}
