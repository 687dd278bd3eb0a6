use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, CallOutcome, ControllerEvent, DisabledReason, LoadPhase, PatientListController,
    PatientListView, SortState, StartCallForm, WebhookDelivery,
};
use shared::domain::{Patient, PatientId, SortDirection, SortKey};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Post-op patient outreach: list patients and start calls")]
struct Cli {
    /// Overrides BACKEND_URL and the settings file.
    #[arg(long)]
    backend_url: Option<String>,
    /// Enables the diagnostic webhook trigger.
    #[arg(long)]
    fallback_webhook_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the patient table.
    List {
        #[arg(long)]
        sort: Option<SortKey>,
        #[arg(long)]
        desc: bool,
    },
    /// Start the outreach call workflow for one patient.
    Call {
        patient_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        surgery_type: Option<String>,
    },
    /// Post a start_call envelope for the first listed patient straight to the fallback webhook.
    WebhookTest,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(url) = cli.backend_url {
        settings = settings.with_backend_url(url);
    }
    if cli.fallback_webhook_url.is_some() {
        settings = settings.with_fallback_webhook_url(cli.fallback_webhook_url);
    }
    tracing::debug!(backend_url = %settings.backend_url, fallback = settings.fallback_enabled(), "settings resolved");

    let controller = PatientListController::new(settings);
    let mut events = controller.subscribe_events();
    controller.mount();
    if controller.wait_loaded().await != LoadPhase::Settled {
        bail!("patient list did not load");
    }
    print_toasts(&mut events);

    let result = run(&controller, &mut events, cli.command).await;
    controller.teardown();
    result
}

async fn run(
    controller: &Arc<PatientListController>,
    events: &mut broadcast::Receiver<ControllerEvent>,
    command: Command,
) -> Result<()> {
    match command {
        Command::List { sort, desc } => {
            if let Some(key) = sort {
                let direction = if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                };
                apply_sort(controller, SortState::new(key, direction));
            }
            print_table(&controller.view());
        }
        Command::Call {
            patient_id,
            name,
            phone,
            language,
            surgery_type,
        } => {
            let form = StartCallForm {
                name,
                phone,
                language,
                surgery_type,
            };
            let patient = find_patient(controller, &patient_id, &form)?;
            let outcome = controller.call_patient_with(&patient, form).await;
            print_toasts(events);
            match outcome {
                CallOutcome::Sent | CallOutcome::Rejected { .. } => {}
                CallOutcome::Disabled(DisabledReason::NoPhone) => {
                    bail!("patient {patient_id} has no phone on file")
                }
                CallOutcome::Disabled(DisabledReason::AlreadyBusy) => {
                    bail!("a call for patient {patient_id} is already in flight")
                }
                CallOutcome::Failed { reason } => bail!("call request failed: {reason}"),
            }
        }
        Command::WebhookTest => {
            if !controller.fallback_enabled() {
                bail!("no fallback webhook configured (set N8N_WEBHOOK_URL or --fallback-webhook-url)");
            }
            match controller.trigger_fallback_webhook().await {
                Some(WebhookDelivery::Delivered) => print_toasts(events),
                Some(WebhookDelivery::Dropped) => {
                    print_toasts(events);
                    tracing::info!("fallback webhook did not accept the post; see debug logs");
                }
                None => println!("No patients."),
            }
        }
    }
    Ok(())
}

/// Reaches `target` through the same toggles a user would click.
fn apply_sort(controller: &PatientListController, target: SortState) {
    for _ in 0..2 {
        if controller.sort() == target {
            return;
        }
        controller.on_sort(target.key);
    }
}

fn find_patient(
    controller: &PatientListController,
    patient_id: &str,
    form: &StartCallForm,
) -> Result<Patient> {
    let id = PatientId::from(patient_id);
    if let Some(patient) = controller.rows().into_iter().find(|p| p.patient_id == id) {
        return Ok(patient);
    }
    if form.is_empty() {
        bail!("patient {patient_id} is not in the list");
    }
    tracing::info!(patient_id, "patient not listed; sending form fields only");
    Ok(Patient::new(patient_id))
}

fn print_toasts(events: &mut broadcast::Receiver<ControllerEvent>) {
    loop {
        match events.try_recv() {
            Ok(ControllerEvent::ToastChanged(Some(toast))) => eprintln!("{toast}"),
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

fn print_table(view: &PatientListView) {
    println!(
        "Patients: {} total (sorted by {} {})",
        view.total,
        view.sort.key.label(),
        view.sort.direction
    );
    if view.is_empty() {
        println!("No patients.");
        return;
    }
    println!(
        "{:<12} {:<16} {:<16} {:<14} {:<14} Action",
        "Patient ID", "First", "Last", "DoB", "Procedure Date"
    );
    for row in &view.rows {
        let action = if row.call_enabled { "Call" } else { row.call_hint };
        println!(
            "{:<12} {:<16} {:<16} {:<14} {:<14} {}",
            row.patient_id, row.first, row.last, row.dob, row.procedure_date, action
        );
    }
}
