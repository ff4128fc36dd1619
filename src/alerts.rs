//! Alert generation, risk scoring, and the reading ingestion path.
//!
//! `ingest_reading` is the single entry point for both simulated and
//! manually submitted readings: one transaction covers the reading insert,
//! any alert inserts, the anomaly flag, and the risk-level write; events go
//! out only after commit.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use metrics::increment_counter;
use sqlx::{Sqlite, Transaction};
use tracing::{info, instrument, warn};

use crate::broadcast::Broadcaster;
use crate::db::Database;
use crate::models::{
    Alert, AlertSeverity, AlertType, Patient, RiskLevel, VitalReading, VitalType,
};
use crate::notify::AlertNotifier;
use crate::thresholds::check_threshold;

/// Vital types evaluated against thresholds on every reading.
pub const MONITORED_VITALS: [VitalType; 3] =
    [VitalType::HeartRate, VitalType::Spo2, VitalType::Temperature];

/// Decision table for the risk scorer, first match wins.
pub fn risk_from_counts(critical: i64, warning: i64) -> RiskLevel {
    if critical >= 2 {
        RiskLevel::Critical
    } else if critical >= 1 || warning >= 3 {
        RiskLevel::High
    } else if warning >= 1 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub struct AlertService {
    db: Arc<Database>,
    broadcaster: Arc<Broadcaster>,
    notifier: Arc<dyn AlertNotifier>,
    risk_window: chrono::Duration,
}

impl AlertService {
    pub fn new(
        db: Arc<Database>,
        broadcaster: Arc<Broadcaster>,
        notifier: Arc<dyn AlertNotifier>,
        risk_window: chrono::Duration,
    ) -> Self {
        Self { db, broadcaster, notifier, risk_window }
    }

    /// Persist a reading, evaluate it, and fan out the results.
    ///
    /// The returned reading carries its assigned id and final anomaly flag;
    /// the alert list is everything evaluation created (possibly empty).
    #[instrument(skip(self, reading, patient), fields(patient_id = patient.id))]
    pub async fn ingest_reading(
        &self,
        reading: VitalReading,
        patient: &Patient,
    ) -> Result<(VitalReading, Vec<Alert>)> {
        let mut reading = reading;
        let mut tx = self.db.pool().begin().await?;

        reading.id = self.db.insert_reading(&mut *tx, &reading).await?;
        let alerts = self.evaluate_and_alert(&mut tx, &reading, patient).await?;

        if !alerts.is_empty() {
            reading.is_anomaly = true;
            self.db.mark_reading_anomalous(&mut *tx, reading.id).await?;
            self.update_risk_in(&mut tx, patient.id).await?;
        }

        tx.commit().await?;
        increment_counter!("vitalguard_readings_ingested_total");

        self.broadcaster
            .emit_vital_update(patient.id, serde_json::to_value(&reading)?);
        for alert in &alerts {
            self.broadcaster
                .emit_alert(patient.id, serde_json::to_value(alert)?);
        }

        Ok((reading, alerts))
    }

    /// Evaluate each monitored vital independently and insert an alert per
    /// breach. Critical breaches dispatch a notification first; the
    /// dispatch outcome is recorded on the alert and can never fail it.
    pub async fn evaluate_and_alert(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        reading: &VitalReading,
        patient: &Patient,
    ) -> Result<Vec<Alert>> {
        let mut alerts = Vec::new();

        for vital in MONITORED_VITALS {
            let Some(value) = reading.value(vital) else {
                continue;
            };
            let bounds = self.db.thresholds_for(&mut **tx, patient.id, vital).await?;
            let Some(breach) = check_threshold(Some(value), &bounds) else {
                continue;
            };

            let direction = if breach.kind.is_low() { "low" } else { "high" };
            let unit = vital.unit();
            let message = format!(
                "{} is too {direction}: {value}{unit} (threshold: {}{unit})",
                vital.display_name(),
                breach.threshold,
            );
            let alert_type = if breach.severity == AlertSeverity::Critical {
                AlertType::VitalCritical
            } else {
                AlertType::VitalWarning
            };

            let mut alert = Alert::new(patient.id, alert_type, breach.severity, message);
            alert.vital_reading_id = Some(reading.id);
            alert.vital_type = Some(vital);
            alert.vital_value = Some(value);
            alert.threshold_breached = Some(breach.threshold);

            if breach.severity == AlertSeverity::Critical {
                let outcome = self
                    .notifier
                    .send_critical_alert(&patient.full_name, vital, value, breach.severity)
                    .await;
                alert.notification_sent = outcome.sent;
                alert.notification_channels = outcome.channel;
                if !outcome.sent {
                    warn!(patient_id = patient.id, vital = %vital, "critical alert notification not sent");
                }
            }

            alert.id = self.db.insert_alert(&mut **tx, &alert).await?;
            warn!(patient_id = patient.id, "alert created: {}", alert.message);
            increment_counter!("vitalguard_alerts_created_total");
            alerts.push(alert);
        }

        Ok(alerts)
    }

    /// Recompute a patient's risk level from alert counts in the trailing
    /// window. Writes only when the level changed; returns the level and
    /// whether a write happened.
    pub async fn update_risk(&self, patient_id: i64) -> Result<(RiskLevel, bool)> {
        let mut tx = self.db.pool().begin().await?;
        let out = self.update_risk_in(&mut tx, patient_id).await?;
        tx.commit().await?;
        Ok(out)
    }

    async fn update_risk_in(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        patient_id: i64,
    ) -> Result<(RiskLevel, bool)> {
        let since = Utc::now() - self.risk_window;
        let critical = self
            .db
            .count_alerts_since(&mut **tx, patient_id, AlertSeverity::Critical, since)
            .await?;
        let warning = self
            .db
            .count_alerts_since(&mut **tx, patient_id, AlertSeverity::Warning, since)
            .await?;

        let level = risk_from_counts(critical, warning);
        let current = self
            .db
            .get_patient_risk(&mut **tx, patient_id)
            .await?
            .ok_or_else(|| anyhow!("patient {patient_id} not found"))?;

        if level == current {
            return Ok((level, false));
        }
        self.db.set_patient_risk(&mut **tx, patient_id, level).await?;
        info!(patient_id, risk = %level, "patient risk level updated");
        Ok((level, true))
    }

    /// Acknowledge an alert, the only mutation alerts permit, and notify
    /// the global room.
    #[instrument(skip(self))]
    pub async fn acknowledge_alert(&self, alert_id: i64, user_id: i64) -> Result<Alert> {
        self.db.update_alert_ack(alert_id, user_id, Utc::now()).await?;
        let alert = self
            .db
            .get_alert(alert_id)
            .await?
            .ok_or_else(|| anyhow!("alert {alert_id} not found"))?;
        self.broadcaster.emit_alert_acknowledged(alert_id, user_id);
        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{VitalPayload, VitalSource};
    use crate::notify::NotificationOutcome;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(String, VitalType, f64)>>,
        fail: bool,
    }

    #[async_trait]
    impl AlertNotifier for RecordingNotifier {
        async fn send_critical_alert(
            &self,
            patient_name: &str,
            vital_type: VitalType,
            vital_value: f64,
            _severity: AlertSeverity,
        ) -> NotificationOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((patient_name.to_string(), vital_type, vital_value));
            if self.fail {
                NotificationOutcome::not_sent()
            } else {
                NotificationOutcome { sent: true, channel: Some("whatsapp".to_string()) }
            }
        }
    }

    struct Fixture {
        db: Arc<Database>,
        service: AlertService,
        notifier: Arc<RecordingNotifier>,
        broadcaster: Arc<Broadcaster>,
    }

    async fn fixture_with(notifier: RecordingNotifier) -> Fixture {
        let db = Arc::new(Database::connect("sqlite::memory:").await.unwrap());
        let broadcaster = Arc::new(Broadcaster::new());
        let notifier = Arc::new(notifier);
        let service = AlertService::new(
            db.clone(),
            broadcaster.clone(),
            notifier.clone(),
            chrono::Duration::hours(1),
        );
        Fixture { db, service, notifier, broadcaster }
    }

    async fn fixture() -> Fixture {
        fixture_with(RecordingNotifier::default()).await
    }

    fn normal_payload(patient_id: i64) -> VitalPayload {
        VitalPayload {
            patient_id,
            timestamp: Utc::now(),
            heart_rate: 80.0,
            spo2: 97.0,
            temperature: 36.8,
            blood_pressure_systolic: 120,
            blood_pressure_diastolic: 78,
            respiratory_rate: 16.0,
            source: VitalSource::Simulated,
            device_id: "SIM-DEVICE-0001".to_string(),
        }
    }

    #[test]
    fn risk_decision_table() {
        assert_eq!(risk_from_counts(2, 0), RiskLevel::Critical);
        assert_eq!(risk_from_counts(3, 5), RiskLevel::Critical);
        assert_eq!(risk_from_counts(1, 0), RiskLevel::High);
        assert_eq!(risk_from_counts(0, 3), RiskLevel::High);
        assert_eq!(risk_from_counts(0, 2), RiskLevel::Medium);
        assert_eq!(risk_from_counts(0, 1), RiskLevel::Medium);
        assert_eq!(risk_from_counts(0, 0), RiskLevel::Low);
    }

    #[tokio::test]
    async fn critical_spo2_reading_creates_one_alert_and_notifies() {
        let f = fixture().await;
        let patient = f.db.create_patient("Ada Lovelace", None).await.unwrap();

        let (conn, mut rx) = f.broadcaster.connect();
        f.broadcaster.subscribe(&conn, crate::broadcast::Topic::Patient(patient.id));

        let mut payload = normal_payload(patient.id);
        payload.spo2 = 85.0;
        let (reading, alerts) = f
            .service
            .ingest_reading(payload.into(), &patient)
            .await
            .unwrap();

        assert!(reading.is_anomaly);
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.alert_type, AlertType::VitalCritical);
        assert_eq!(alert.vital_type, Some(VitalType::Spo2));
        assert_eq!(alert.threshold_breached, Some(88.0));
        assert_eq!(alert.vital_reading_id, Some(reading.id));
        assert!(alert.notification_sent);
        assert_eq!(alert.notification_channels.as_deref(), Some("whatsapp"));
        assert_eq!(alert.message, "SpO2 is too low: 85% (threshold: 88%)");

        let calls = f.notifier.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("Ada Lovelace".to_string(), VitalType::Spo2, 85.0));
        drop(calls);

        // Persisted reading carries the anomaly flag.
        let stored = f
            .db
            .query_readings(patient.id, Utc::now() - chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert!(stored[0].is_anomaly);

        // One critical alert in the window lifts risk to high.
        let risk = f.db.get_patient_risk(f.db.pool(), patient.id).await.unwrap();
        assert_eq!(risk, Some(RiskLevel::High));

        // Both the vital update and the alert reached the patient room.
        assert_eq!(rx.try_recv().unwrap().event, crate::broadcast::VITAL_UPDATE);
        assert_eq!(rx.try_recv().unwrap().event, crate::broadcast::ALERT_NEW);
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_alert_creation() {
        let f = fixture_with(RecordingNotifier { fail: true, ..Default::default() }).await;
        let patient = f.db.create_patient("Grace Hopper", None).await.unwrap();

        let mut payload = normal_payload(patient.id);
        payload.spo2 = 85.0;
        let (_, alerts) = f
            .service
            .ingest_reading(payload.into(), &patient)
            .await
            .unwrap();

        assert_eq!(alerts.len(), 1);
        assert!(!alerts[0].notification_sent);
        assert!(alerts[0].notification_channels.is_none());
    }

    #[tokio::test]
    async fn reading_with_no_values_produces_no_alerts() {
        let f = fixture().await;
        let patient = f.db.create_patient("Mary Seacole", None).await.unwrap();

        let reading = VitalReading {
            id: 0,
            patient_id: patient.id,
            timestamp: Utc::now(),
            heart_rate: None,
            spo2: None,
            temperature: None,
            blood_pressure_systolic: None,
            blood_pressure_diastolic: None,
            respiratory_rate: None,
            source: VitalSource::Manual,
            device_id: None,
            is_anomaly: false,
            anomaly_score: None,
        };
        let (reading, alerts) = f.service.ingest_reading(reading, &patient).await.unwrap();
        assert!(alerts.is_empty());
        assert!(!reading.is_anomaly);
        assert!(f.notifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn multiple_breaches_create_independent_alerts() {
        let f = fixture().await;
        let patient = f.db.create_patient("Florence", None).await.unwrap();

        let mut payload = normal_payload(patient.id);
        payload.heart_rate = 130.0; // above critical max 120
        payload.temperature = 37.8; // above warning max 37.5, below critical max 38.5
        let (_, alerts) = f
            .service
            .ingest_reading(payload.into(), &patient)
            .await
            .unwrap();

        assert_eq!(alerts.len(), 2);
        let hr = alerts.iter().find(|a| a.vital_type == Some(VitalType::HeartRate)).unwrap();
        assert_eq!(hr.severity, AlertSeverity::Critical);
        let temp = alerts.iter().find(|a| a.vital_type == Some(VitalType::Temperature)).unwrap();
        assert_eq!(temp.severity, AlertSeverity::Warning);
        assert_eq!(temp.alert_type, AlertType::VitalWarning);
        // Only the critical breach dispatched a notification.
        assert_eq!(f.notifier.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn risk_updates_write_once_and_ignore_stale_alerts() {
        let f = fixture().await;
        let patient = f.db.create_patient("Joan Clarke", None).await.unwrap();

        // Two fresh criticals, one stale warning outside the window.
        for _ in 0..2 {
            let alert = Alert::new(
                patient.id,
                AlertType::VitalCritical,
                AlertSeverity::Critical,
                "test".to_string(),
            );
            f.db.insert_alert(f.db.pool(), &alert).await.unwrap();
        }
        let mut stale = Alert::new(
            patient.id,
            AlertType::VitalWarning,
            AlertSeverity::Warning,
            "stale".to_string(),
        );
        stale.created_at = Utc::now() - chrono::Duration::hours(2);
        f.db.insert_alert(f.db.pool(), &stale).await.unwrap();

        let (level, changed) = f.service.update_risk(patient.id).await.unwrap();
        assert_eq!(level, RiskLevel::Critical);
        assert!(changed);

        // No new alerts: same level, no write.
        let (level, changed) = f.service.update_risk(patient.id).await.unwrap();
        assert_eq!(level, RiskLevel::Critical);
        assert!(!changed);
    }

    #[tokio::test]
    async fn single_warning_maps_to_medium_and_empty_window_to_low() {
        let f = fixture().await;
        let patient = f.db.create_patient("Rosalind", None).await.unwrap();

        let alert = Alert::new(
            patient.id,
            AlertType::VitalWarning,
            AlertSeverity::Warning,
            "test".to_string(),
        );
        f.db.insert_alert(f.db.pool(), &alert).await.unwrap();
        let (level, _) = f.service.update_risk(patient.id).await.unwrap();
        assert_eq!(level, RiskLevel::Medium);

        // Only stale alerts in history: low, even though history is non-empty.
        let patient2 = f.db.create_patient("Dorothy", None).await.unwrap();
        let mut stale = Alert::new(
            patient2.id,
            AlertType::VitalCritical,
            AlertSeverity::Critical,
            "old".to_string(),
        );
        stale.created_at = Utc::now() - chrono::Duration::hours(3);
        f.db.insert_alert(f.db.pool(), &stale).await.unwrap();
        let (level, changed) = f.service.update_risk(patient2.id).await.unwrap();
        assert_eq!(level, RiskLevel::Low);
        assert!(changed);
    }

    #[tokio::test]
    async fn acknowledgement_broadcasts_to_global_room() {
        let f = fixture().await;
        let patient = f.db.create_patient("Edith", None).await.unwrap();
        let alert = Alert::new(
            patient.id,
            AlertType::VitalWarning,
            AlertSeverity::Warning,
            "test".to_string(),
        );
        let alert_id = f.db.insert_alert(f.db.pool(), &alert).await.unwrap();

        let (conn, mut rx) = f.broadcaster.connect();
        f.broadcaster.subscribe(&conn, crate::broadcast::Topic::Alerts);

        let acked = f.service.acknowledge_alert(alert_id, 42).await.unwrap();
        assert!(acked.is_acknowledged);
        assert_eq!(acked.acknowledged_by, Some(42));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event, crate::broadcast::ALERT_ACKNOWLEDGED);
        assert_eq!(event.payload["alert_id"], alert_id);
    }
}
