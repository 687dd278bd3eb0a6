use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use reqwest::Client;
use shared::{
    domain::{Patient, PatientId, SortKey},
    protocol::StartCallRequest,
};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod config;
pub mod error;
pub mod sorting;
pub mod toast;
pub mod transport;
pub mod view;
pub mod webhook;

pub use config::{load_settings, Settings};
pub use error::RequestError;
pub use sorting::SortState;
pub use toast::{Toast, ToastKind};
pub use transport::{HttpOutreachApi, MissingOutreachApi, OutreachApi};
pub use view::{PatientListView, PatientRowView};
pub use webhook::{FallbackWebhook, WebhookDelivery};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    RowsLoaded { count: usize },
    SortChanged(SortState),
    BusyChanged { patient_id: PatientId, busy: bool },
    ToastChanged(Option<Toast>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Pending,
    Settled,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    NoPhone,
    AlreadyBusy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The control was disabled; no request was made.
    Disabled(DisabledReason),
    Sent,
    Rejected { status: String },
    Failed { reason: String },
}

/// Optional fields for the extended start-call form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartCallForm {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub language: Option<String>,
    pub surgery_type: Option<String>,
}

impl StartCallForm {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.language.is_none()
            && self.surgery_type.is_none()
    }

    fn has_phone(&self) -> bool {
        self.phone
            .as_deref()
            .is_some_and(|phone| !phone.trim().is_empty())
    }

    fn into_request(self, patient_id: PatientId) -> StartCallRequest {
        StartCallRequest {
            patient_id,
            name: self.name,
            phone: self.phone,
            language: self.language,
            surgery_type: self.surgery_type,
        }
    }
}

struct ControllerState {
    rows: Vec<Patient>,
    loading: bool,
    fetch_started: bool,
    sort: SortState,
    busy: HashSet<PatientId>,
    toast: Option<Toast>,
    toast_generation: u64,
    toast_timer: Option<JoinHandle<()>>,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            loading: true,
            fetch_started: false,
            sort: SortState::default(),
            busy: HashSet::new(),
            toast: None,
            toast_generation: 0,
            toast_timer: None,
        }
    }
}

/// Owns the patient rows plus sort, busy, loading and toast state for one
/// mounted list view. Requests that finish after [`teardown`] commit nothing.
///
/// [`teardown`]: PatientListController::teardown
pub struct PatientListController {
    api: Arc<dyn OutreachApi>,
    fallback: Option<FallbackWebhook>,
    settings: Settings,
    inner: Arc<Mutex<ControllerState>>,
    alive: Arc<AtomicBool>,
    load_phase: watch::Sender<LoadPhase>,
    events: broadcast::Sender<ControllerEvent>,
}

impl PatientListController {
    pub fn new(settings: Settings) -> Arc<Self> {
        let http = Client::new();
        let fallback = match FallbackWebhook::from_settings(http.clone(), &settings) {
            Ok(fallback) => fallback,
            Err(err) => {
                warn!(%err, "fallback webhook disabled");
                None
            }
        };
        let api = Arc::new(HttpOutreachApi::with_client(http, settings.clone()));
        Self::new_with_dependencies(api, fallback, settings)
    }

    pub fn new_with_dependencies(
        api: Arc<dyn OutreachApi>,
        fallback: Option<FallbackWebhook>,
        settings: Settings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (load_phase, _) = watch::channel(LoadPhase::Pending);
        Arc::new(Self {
            api,
            fallback,
            settings,
            inner: Arc::new(Mutex::new(ControllerState::new())),
            alive: Arc::new(AtomicBool::new(true)),
            load_phase,
            events,
        })
    }

    /// Starts the one-time patient fetch in the background.
    pub fn mount(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.load_patients().await })
    }

    /// Resolves once the initial fetch has settled or the controller was torn down.
    pub async fn wait_loaded(&self) -> LoadPhase {
        let mut rx = self.load_phase.subscribe();
        let phase = match rx.wait_for(|phase| *phase != LoadPhase::Pending).await {
            Ok(phase) => *phase,
            Err(_) => LoadPhase::Abandoned,
        };
        phase
    }

    pub async fn load_patients(&self) {
        {
            let mut state = self.state();
            if state.fetch_started {
                debug!("patient list already fetched for this controller");
                return;
            }
            state.fetch_started = true;
        }

        let result = self.api.list_patients().await;
        if !self.is_alive() {
            debug!("controller torn down before patient list settled");
            return;
        }

        {
            let mut state = self.state();
            match result {
                Ok(rows) => {
                    info!(count = rows.len(), "patient list loaded");
                    let count = rows.len();
                    state.rows = rows;
                    self.emit(ControllerEvent::RowsLoaded { count });
                }
                Err(err) => {
                    warn!(%err, "failed to load patients");
                    state.rows.clear();
                    self.show_toast(&mut state, Toast::load_failed(&err.to_string()));
                    self.schedule_toast_clear(&mut state, self.settings.toast_ttl);
                }
            }
            state.loading = false;
        }
        self.load_phase.send_replace(LoadPhase::Settled);
    }

    pub fn on_sort(&self, key: SortKey) -> SortState {
        let mut state = self.state();
        state.sort.toggle(key);
        let sort = state.sort;
        debug!(key = %sort.key, direction = %sort.direction, "sort changed");
        self.emit(ControllerEvent::SortChanged(sort));
        sort
    }

    pub async fn call_patient(&self, patient: &Patient) -> CallOutcome {
        self.call_patient_with(patient, StartCallForm::default()).await
    }

    /// Starts the outreach workflow for one row. Form fields, when given, are
    /// sent alongside the id and a form phone makes a phoneless row callable.
    pub async fn call_patient_with(&self, patient: &Patient, form: StartCallForm) -> CallOutcome {
        if !patient.has_phone() && !form.has_phone() {
            debug!(patient_id = %patient.patient_id, "call suppressed: no phone on file");
            return CallOutcome::Disabled(DisabledReason::NoPhone);
        }

        let Some(in_flight) = self.begin_call(patient) else {
            debug!(patient_id = %patient.patient_id, "call suppressed: already in flight");
            return CallOutcome::Disabled(DisabledReason::AlreadyBusy);
        };

        let request = form.into_request(patient.patient_id.clone());
        info!(patient_id = %request.patient_id, "starting outreach call");
        let (outcome, toast) = match self.api.start_call(&request).await {
            Ok(response) if response.ok => {
                info!(patient_id = %request.patient_id, "call accepted");
                (CallOutcome::Sent, Toast::call_sent())
            }
            Ok(response) => {
                let status = response
                    .failure_text()
                    .unwrap_or_else(|| "unknown".to_string());
                warn!(patient_id = %request.patient_id, %status, "call rejected by backend");
                let toast = Toast::call_rejected(&status);
                (CallOutcome::Rejected { status }, toast)
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(patient_id = %request.patient_id, %reason, "call request failed");
                let toast = Toast::call_failed(&reason);
                (CallOutcome::Failed { reason }, toast)
            }
        };

        in_flight.finish(toast);
        outcome
    }

    /// Posts the fallback envelope for the first row of the current view.
    /// Returns `None` when the fallback is not configured or there are no rows.
    pub async fn trigger_fallback_webhook(&self) -> Option<WebhookDelivery> {
        let fallback = self.fallback.as_ref()?;
        let patient_id = self.sorted_rows().into_iter().next()?.patient_id;

        {
            let mut state = self.state();
            self.show_toast(&mut state, Toast::fallback_posted());
            self.schedule_toast_clear(&mut state, self.settings.fallback_toast_ttl);
        }

        Some(fallback.post_best_effort(patient_id).await)
    }

    /// Detaches the controller from its view. Pending timers are cancelled and
    /// in-flight requests no longer touch state when they complete.
    pub fn teardown(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(timer) = self.state().toast_timer.take() {
            timer.abort();
        }
        self.load_phase.send_if_modified(|phase| {
            if *phase == LoadPhase::Pending {
                *phase = LoadPhase::Abandoned;
                true
            } else {
                false
            }
        });
        debug!("patient list controller torn down");
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn is_busy(&self, patient_id: &PatientId) -> bool {
        self.state().busy.contains(patient_id)
    }

    pub fn sort(&self) -> SortState {
        self.state().sort
    }

    pub fn toast(&self) -> Option<Toast> {
        self.state().toast.clone()
    }

    pub fn rows(&self) -> Vec<Patient> {
        self.state().rows.clone()
    }

    pub fn sorted_rows(&self) -> Vec<Patient> {
        let state = self.state();
        sorting::sort_patients(&state.rows, state.sort)
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn view(&self) -> PatientListView {
        let state = self.state();
        let rows = if state.loading {
            Vec::new()
        } else {
            sorting::sort_patients(&state.rows, state.sort)
                .iter()
                .map(|patient| PatientRowView::new(patient, state.busy.contains(&patient.patient_id)))
                .collect()
        };
        PatientListView {
            loading: state.loading,
            placeholder_rows: if state.loading {
                view::PLACEHOLDER_ROWS
            } else {
                0
            },
            total: state.rows.len(),
            sort: state.sort,
            rows,
            toast: state.toast.clone(),
            fallback_enabled: self.fallback_enabled(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    fn begin_call(&self, patient: &Patient) -> Option<InFlightCall<'_>> {
        let mut state = self.state();
        if !state.busy.insert(patient.patient_id.clone()) {
            return None;
        }
        self.emit(ControllerEvent::BusyChanged {
            patient_id: patient.patient_id.clone(),
            busy: true,
        });
        self.show_toast(&mut state, Toast::starting_call(patient));
        Some(InFlightCall {
            controller: self,
            patient_id: patient.patient_id.clone(),
            result_toast: None,
        })
    }

    fn release_busy(&self, patient_id: &PatientId, toast: Option<Toast>) {
        if !self.is_alive() {
            return;
        }
        let mut state = self.state();
        if state.busy.remove(patient_id) {
            self.emit(ControllerEvent::BusyChanged {
                patient_id: patient_id.clone(),
                busy: false,
            });
        }
        if let Some(toast) = toast {
            self.show_toast(&mut state, toast);
        }
        self.schedule_toast_clear(&mut state, self.settings.toast_ttl);
    }

    fn show_toast(&self, state: &mut ControllerState, toast: Toast) {
        state.toast_generation = state.toast_generation.wrapping_add(1);
        if let Some(timer) = state.toast_timer.take() {
            timer.abort();
        }
        state.toast = Some(toast.clone());
        self.emit(ControllerEvent::ToastChanged(Some(toast)));
    }

    /// Clears the current toast after `ttl` unless a newer one replaced it.
    fn schedule_toast_clear(&self, state: &mut ControllerState, ttl: Duration) {
        if state.toast.is_none() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if let Some(timer) = state.toast_timer.take() {
            timer.abort();
        }
        let generation = state.toast_generation;
        let inner = Arc::clone(&self.inner);
        let alive = Arc::clone(&self.alive);
        let events = self.events.clone();
        state.toast_timer = Some(runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if !alive.load(Ordering::SeqCst) {
                return;
            }
            let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if state.toast_generation == generation && state.toast.is_some() {
                state.toast = None;
                state.toast_timer = None;
                let _ = events.send(ControllerEvent::ToastChanged(None));
            }
        }));
    }
}

impl Drop for PatientListController {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Busy marker for one row. Dropping it, including when the request future
/// is cancelled, clears the marker.
struct InFlightCall<'a> {
    controller: &'a PatientListController,
    patient_id: PatientId,
    result_toast: Option<Toast>,
}

impl InFlightCall<'_> {
    fn finish(mut self, toast: Toast) {
        self.result_toast = Some(toast);
    }
}

impl Drop for InFlightCall<'_> {
    fn drop(&mut self) {
        self.controller
            .release_busy(&self.patient_id, self.result_toast.take());
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
