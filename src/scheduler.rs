//! The ingestion cycle driver.
//!
//! One background task owns the repeating cycle: for every patient,
//! generate a reading, run it through the alert path, then sweep overdue
//! medication doses. A fault in one patient's processing is logged and
//! skips only that patient; a fault listing patients skips the whole cycle
//! and the next interval retries. `stop` signals the loop to not start
//! another cycle and joins the task, letting an in-flight cycle finish.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use metrics::increment_counter;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::AlertService;
use crate::broadcast::Broadcaster;
use crate::config::Settings;
use crate::db::Database;
use crate::models::{Alert, AlertSeverity, AlertType, MedicationLog, MedicationStatus, Patient};
use crate::simulator::VitalSimulator;

struct RunningTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct IngestScheduler {
    db: Arc<Database>,
    simulator: Arc<VitalSimulator>,
    alerts: Arc<AlertService>,
    broadcaster: Arc<Broadcaster>,
    settings: Settings,
    running: Mutex<Option<RunningTask>>,
}

impl IngestScheduler {
    pub fn new(
        db: Arc<Database>,
        simulator: Arc<VitalSimulator>,
        alerts: Arc<AlertService>,
        broadcaster: Arc<Broadcaster>,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            simulator,
            alerts,
            broadcaster,
            settings,
            running: Mutex::new(None),
        }
    }

    /// Spawn the cycle loop. Idempotent: starting while running is a
    /// logged no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("ingest scheduler already running");
            return;
        }

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let this = Arc::clone(self);
        let interval = self.settings.simulation_interval();

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "ingest scheduler started");
            loop {
                if *cancel_rx.borrow() {
                    break;
                }
                this.run_cycle().await;
                tokio::select! {
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("ingest scheduler stopped");
        });

        *running = Some(RunningTask { cancel: cancel_tx, handle });
    }

    /// Signal the loop and wait for it to wind down. Must complete before
    /// the database the scheduler writes to is torn down.
    pub async fn stop(&self) {
        let task = self.running.lock().await.take();
        let Some(task) = task else {
            info!("ingest scheduler not running");
            return;
        };
        let _ = task.cancel.send(true);
        if let Err(e) = task.handle.await {
            error!("scheduler task join error: {e}");
        }
    }

    /// One pass over all patients. Never errors: every fault is contained
    /// to the patient (or cycle) it occurred in.
    pub async fn run_cycle(&self) {
        increment_counter!("vitalguard_cycles_total");

        let patients = match self.db.list_patients().await {
            Ok(patients) => patients,
            Err(e) => {
                error!("failed to list patients, skipping cycle: {e:#}");
                return;
            }
        };

        for patient in &patients {
            if let Err(e) = self.process_patient(patient).await {
                increment_counter!("vitalguard_patient_faults_total");
                error!(patient_id = patient.id, "error processing patient: {e:#}");
            }
        }
    }

    #[instrument(skip(self, patient), fields(patient_id = patient.id))]
    async fn process_patient(&self, patient: &Patient) -> Result<()> {
        let payload = self.simulator.generate(patient);
        let (_, alerts) = self.alerts.ingest_reading(payload.into(), patient).await?;
        if !alerts.is_empty() {
            debug!(count = alerts.len(), "cycle produced alerts");
        }
        self.sweep_missed_medications(patient).await?;
        Ok(())
    }

    /// Transition overdue pending doses to missed, raising a warning alert
    /// per dose. Each dose commits independently; one bad log does not
    /// block the rest.
    async fn sweep_missed_medications(&self, patient: &Patient) -> Result<()> {
        let cutoff = Utc::now() - self.settings.medication_grace();
        let overdue = self.db.list_pending_medication_logs(patient.id, cutoff).await?;

        for log in overdue {
            if let Err(e) = self.mark_dose_missed(patient, &log).await {
                error!(
                    patient_id = patient.id,
                    log_id = log.id,
                    "failed to mark dose missed: {e:#}"
                );
            }
        }
        Ok(())
    }

    async fn mark_dose_missed(&self, patient: &Patient, log: &MedicationLog) -> Result<()> {
        let medication_name = self
            .db
            .get_medication(log.medication_id)
            .await?
            .map(|m| m.name)
            .unwrap_or_else(|| "Unknown medication".to_string());

        let mut tx = self.db.pool().begin().await?;
        self.db
            .update_medication_log_status(&mut *tx, log.id, MedicationStatus::Missed, None)
            .await?;

        let message = format!(
            "Missed medication: {medication_name} was scheduled at {}",
            log.scheduled_time.format("%H:%M")
        );
        let mut alert = Alert::new(
            patient.id,
            AlertType::MedicationMissed,
            AlertSeverity::Warning,
            message,
        );
        alert.id = self.db.insert_alert(&mut *tx, &alert).await?;
        tx.commit().await?;

        warn!(patient_id = patient.id, medication = %medication_name, "medication missed");
        increment_counter!("vitalguard_missed_doses_total");
        self.broadcaster
            .emit_alert(patient.id, serde_json::to_value(&alert)?);
        Ok(())
    }
}
