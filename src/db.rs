//! SQLite persistence layer.
//!
//! Schema is bootstrapped on connect with `CREATE TABLE IF NOT EXISTS`.
//! Timestamps are stored as unix seconds. Methods used inside the
//! scheduler's per-patient transaction take an executor so one commit can
//! cover a reading, its alerts, and the risk-level write; everything else
//! runs against the pool.

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::{info, instrument};

use crate::models::{
    Alert, AlertSeverity, AlertThreshold, AlertType, Medication, MedicationLog, MedicationStatus,
    Patient, RiskLevel, VitalReading, VitalSource, VitalType,
};
use crate::thresholds::{self, ThresholdBounds};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url: {url}"))?
            .create_if_missing(true);

        // Every connection to a `:memory:` database is its own database, so
        // the pool must be clamped to a single long-lived connection there.
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None::<std::time::Duration>)
                .max_lifetime(None::<std::time::Duration>);
        }

        let pool = pool_options.connect_with(options).await?;
        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS patients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name TEXT NOT NULL,
                condition_summary TEXT,
                risk_level TEXT NOT NULL DEFAULT 'medium',
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vital_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                heart_rate REAL,
                spo2 REAL,
                temperature REAL,
                blood_pressure_systolic INTEGER,
                blood_pressure_diastolic INTEGER,
                respiratory_rate REAL,
                source TEXT NOT NULL,
                device_id TEXT,
                is_anomaly INTEGER NOT NULL DEFAULT 0,
                anomaly_score REAL,
                FOREIGN KEY (patient_id) REFERENCES patients(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alert_thresholds (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL,
                vital_type TEXT NOT NULL,
                min_warning REAL,
                max_warning REAL,
                min_critical REAL,
                max_critical REAL,
                created_at INTEGER NOT NULL,
                UNIQUE (patient_id, vital_type),
                FOREIGN KEY (patient_id) REFERENCES patients(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL,
                vital_reading_id INTEGER,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                message TEXT NOT NULL,
                vital_type TEXT,
                vital_value REAL,
                threshold_breached REAL,
                is_acknowledged INTEGER NOT NULL DEFAULT 0,
                acknowledged_by INTEGER,
                acknowledged_at INTEGER,
                notification_sent INTEGER NOT NULL DEFAULT 0,
                notification_channels TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (patient_id) REFERENCES patients(id),
                FOREIGN KEY (vital_reading_id) REFERENCES vital_readings(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS medications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                dosage TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                FOREIGN KEY (patient_id) REFERENCES patients(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS medication_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                medication_id INTEGER NOT NULL,
                patient_id INTEGER NOT NULL,
                scheduled_time INTEGER NOT NULL,
                taken_time INTEGER,
                status TEXT NOT NULL DEFAULT 'pending',
                FOREIGN KEY (medication_id) REFERENCES medications(id),
                FOREIGN KEY (patient_id) REFERENCES patients(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_readings_patient_ts
             ON vital_readings(patient_id, timestamp)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_alerts_patient_created
             ON alerts(patient_id, created_at)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_med_logs_patient_status
             ON medication_logs(patient_id, status, scheduled_time)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ===== Patients =====

    /// Insert a patient and bootstrap their threshold records from the
    /// system default table, in one transaction.
    #[instrument(skip(self, condition_summary))]
    pub async fn create_patient(
        &self,
        full_name: &str,
        condition_summary: Option<&str>,
    ) -> Result<Patient> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let patient_id = sqlx::query(
            "INSERT INTO patients (full_name, condition_summary, risk_level, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(full_name)
        .bind(condition_summary)
        .bind(RiskLevel::Medium.as_str())
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for record in thresholds::default_thresholds_for(patient_id) {
            sqlx::query(
                "INSERT INTO alert_thresholds
                 (patient_id, vital_type, min_warning, max_warning, min_critical, max_critical, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.patient_id)
            .bind(record.vital_type.as_str())
            .bind(record.min_warning)
            .bind(record.max_warning)
            .bind(record.min_critical)
            .bind(record.max_critical)
            .bind(now.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(patient_id, "patient created");

        Ok(Patient {
            id: patient_id,
            full_name: full_name.to_string(),
            condition_summary: condition_summary.map(str::to_string),
            risk_level: RiskLevel::Medium,
            created_at: now,
        })
    }

    pub async fn get_patient(&self, patient_id: i64) -> Result<Option<Patient>> {
        let row = sqlx::query("SELECT * FROM patients WHERE id = ?")
            .bind(patient_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(patient_from_row).transpose()
    }

    pub async fn list_patients(&self) -> Result<Vec<Patient>> {
        let rows = sqlx::query("SELECT * FROM patients ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(patient_from_row).collect()
    }

    pub async fn get_patient_risk(
        &self,
        exec: impl SqliteExecutor<'_>,
        patient_id: i64,
    ) -> Result<Option<RiskLevel>> {
        let row = sqlx::query("SELECT risk_level FROM patients WHERE id = ?")
            .bind(patient_id)
            .fetch_optional(exec)
            .await?;
        row.map(|r| -> Result<RiskLevel> {
            RiskLevel::from_str(r.try_get::<String, _>("risk_level")?.as_str())
        })
        .transpose()
    }

    pub async fn set_patient_risk(
        &self,
        exec: impl SqliteExecutor<'_>,
        patient_id: i64,
        level: RiskLevel,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE patients SET risk_level = ? WHERE id = ?")
            .bind(level.as_str())
            .bind(patient_id)
            .execute(exec)
            .await?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("patient {patient_id} not found"));
        }
        Ok(())
    }

    // ===== Vital readings =====

    pub async fn insert_reading(
        &self,
        exec: impl SqliteExecutor<'_>,
        reading: &VitalReading,
    ) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO vital_readings (
                patient_id, timestamp, heart_rate, spo2, temperature,
                blood_pressure_systolic, blood_pressure_diastolic,
                respiratory_rate, source, device_id, is_anomaly, anomaly_score
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(reading.patient_id)
        .bind(reading.timestamp.timestamp())
        .bind(reading.heart_rate)
        .bind(reading.spo2)
        .bind(reading.temperature)
        .bind(reading.blood_pressure_systolic)
        .bind(reading.blood_pressure_diastolic)
        .bind(reading.respiratory_rate)
        .bind(reading.source.as_str())
        .bind(&reading.device_id)
        .bind(reading.is_anomaly)
        .bind(reading.anomaly_score)
        .execute(exec)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn query_readings(
        &self,
        patient_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<VitalReading>> {
        let rows = sqlx::query(
            "SELECT * FROM vital_readings
             WHERE patient_id = ? AND timestamp >= ?
             ORDER BY timestamp",
        )
        .bind(patient_id)
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(reading_from_row).collect()
    }

    pub async fn mark_reading_anomalous(
        &self,
        exec: impl SqliteExecutor<'_>,
        reading_id: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE vital_readings SET is_anomaly = 1 WHERE id = ?")
            .bind(reading_id)
            .execute(exec)
            .await?;
        Ok(())
    }

    // ===== Thresholds =====

    pub async fn get_thresholds(
        &self,
        exec: impl SqliteExecutor<'_>,
        patient_id: i64,
        vital: VitalType,
    ) -> Result<Option<ThresholdBounds>> {
        let row = sqlx::query(
            "SELECT min_warning, max_warning, min_critical, max_critical
             FROM alert_thresholds WHERE patient_id = ? AND vital_type = ?",
        )
        .bind(patient_id)
        .bind(vital.as_str())
        .fetch_optional(exec)
        .await?;
        Ok(row.map(|r| bounds_from_row(&r)).transpose()?)
    }

    /// Explicit per-patient record first, then the system default table.
    /// A vital with neither gets an empty band, which never breaches.
    pub async fn thresholds_for(
        &self,
        exec: impl SqliteExecutor<'_>,
        patient_id: i64,
        vital: VitalType,
    ) -> Result<ThresholdBounds> {
        if let Some(bounds) = self.get_thresholds(exec, patient_id, vital).await? {
            return Ok(bounds);
        }
        Ok(thresholds::default_bounds(vital).unwrap_or_default())
    }

    pub async fn list_thresholds(&self, patient_id: i64) -> Result<Vec<AlertThreshold>> {
        let rows = sqlx::query(
            "SELECT * FROM alert_thresholds WHERE patient_id = ? ORDER BY vital_type",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(threshold_from_row).collect()
    }

    /// Create or replace a patient's band for one vital type. Rejects
    /// records that violate the band-ordering invariant.
    #[instrument(skip(self, bounds))]
    pub async fn upsert_threshold(
        &self,
        patient_id: i64,
        vital: VitalType,
        bounds: ThresholdBounds,
    ) -> Result<()> {
        bounds.validate(vital)?;
        sqlx::query(
            "INSERT INTO alert_thresholds
             (patient_id, vital_type, min_warning, max_warning, min_critical, max_critical, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (patient_id, vital_type) DO UPDATE SET
                min_warning = excluded.min_warning,
                max_warning = excluded.max_warning,
                min_critical = excluded.min_critical,
                max_critical = excluded.max_critical",
        )
        .bind(patient_id)
        .bind(vital.as_str())
        .bind(bounds.min_warning)
        .bind(bounds.max_warning)
        .bind(bounds.min_critical)
        .bind(bounds.max_critical)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Alerts =====

    pub async fn insert_alert(
        &self,
        exec: impl SqliteExecutor<'_>,
        alert: &Alert,
    ) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO alerts (
                patient_id, vital_reading_id, alert_type, severity, message,
                vital_type, vital_value, threshold_breached,
                is_acknowledged, acknowledged_by, acknowledged_at,
                notification_sent, notification_channels, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(alert.patient_id)
        .bind(alert.vital_reading_id)
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.vital_type.map(|v| v.as_str()))
        .bind(alert.vital_value)
        .bind(alert.threshold_breached)
        .bind(alert.is_acknowledged)
        .bind(alert.acknowledged_by)
        .bind(alert.acknowledged_at.map(|t| t.timestamp()))
        .bind(alert.notification_sent)
        .bind(&alert.notification_channels)
        .bind(alert.created_at.timestamp())
        .execute(exec)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn query_alerts(
        &self,
        patient_id: i64,
        severity: Option<AlertSeverity>,
        since: Option<DateTime<Utc>>,
        acknowledged: Option<bool>,
    ) -> Result<Vec<Alert>> {
        let mut qb =
            sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM alerts WHERE patient_id = ");
        qb.push_bind(patient_id);
        if let Some(severity) = severity {
            qb.push(" AND severity = ").push_bind(severity.as_str());
        }
        if let Some(since) = since {
            qb.push(" AND created_at >= ").push_bind(since.timestamp());
        }
        if let Some(acknowledged) = acknowledged {
            qb.push(" AND is_acknowledged = ").push_bind(acknowledged);
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(alert_from_row).collect()
    }

    pub async fn get_alert(&self, alert_id: i64) -> Result<Option<Alert>> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = ?")
            .bind(alert_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(alert_from_row).transpose()
    }

    pub async fn count_alerts_since(
        &self,
        exec: impl SqliteExecutor<'_>,
        patient_id: i64,
        severity: AlertSeverity,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM alerts
             WHERE patient_id = ? AND severity = ? AND created_at >= ?",
        )
        .bind(patient_id)
        .bind(severity.as_str())
        .bind(since.timestamp())
        .fetch_one(exec)
        .await?;
        Ok(row.try_get("n")?)
    }

    #[instrument(skip(self))]
    pub async fn update_alert_ack(
        &self,
        alert_id: i64,
        acknowledged_by: i64,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE alerts SET is_acknowledged = 1, acknowledged_by = ?, acknowledged_at = ?
             WHERE id = ?",
        )
        .bind(acknowledged_by)
        .bind(acknowledged_at.timestamp())
        .bind(alert_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("alert {alert_id} not found"));
        }
        Ok(())
    }

    // ===== Medications =====

    pub async fn add_medication(
        &self,
        patient_id: i64,
        name: &str,
        dosage: Option<&str>,
    ) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO medications (patient_id, name, dosage, is_active) VALUES (?, ?, ?, 1)",
        )
        .bind(patient_id)
        .bind(name)
        .bind(dosage)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn schedule_dose(
        &self,
        medication_id: i64,
        patient_id: i64,
        scheduled_time: DateTime<Utc>,
    ) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO medication_logs (medication_id, patient_id, scheduled_time, status)
             VALUES (?, ?, ?, ?)",
        )
        .bind(medication_id)
        .bind(patient_id)
        .bind(scheduled_time.timestamp())
        .bind(MedicationStatus::Pending.as_str())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn get_medication(&self, medication_id: i64) -> Result<Option<Medication>> {
        let row = sqlx::query("SELECT * FROM medications WHERE id = ?")
            .bind(medication_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(medication_from_row).transpose()
    }

    pub async fn get_medication_log(&self, log_id: i64) -> Result<Option<MedicationLog>> {
        let row = sqlx::query("SELECT * FROM medication_logs WHERE id = ?")
            .bind(log_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(medication_log_from_row).transpose()
    }

    /// Pending doses scheduled strictly before `before`.
    pub async fn list_pending_medication_logs(
        &self,
        patient_id: i64,
        before: DateTime<Utc>,
    ) -> Result<Vec<MedicationLog>> {
        let rows = sqlx::query(
            "SELECT * FROM medication_logs
             WHERE patient_id = ? AND status = ? AND scheduled_time < ?
             ORDER BY scheduled_time",
        )
        .bind(patient_id)
        .bind(MedicationStatus::Pending.as_str())
        .bind(before.timestamp())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(medication_log_from_row).collect()
    }

    pub async fn update_medication_log_status(
        &self,
        exec: impl SqliteExecutor<'_>,
        log_id: i64,
        status: MedicationStatus,
        taken_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE medication_logs SET status = ?, taken_time = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(taken_time.map(|t| t.timestamp()))
            .bind(log_id)
            .execute(exec)
            .await?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("medication log {log_id} not found"));
        }
        Ok(())
    }
}

// ===== Row mapping =====

fn timestamp_from(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| anyhow!("timestamp out of range: {secs}"))
}

fn patient_from_row(row: &SqliteRow) -> Result<Patient> {
    Ok(Patient {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        condition_summary: row.try_get("condition_summary")?,
        risk_level: RiskLevel::from_str(row.try_get::<String, _>("risk_level")?.as_str())?,
        created_at: timestamp_from(row.try_get("created_at")?)?,
    })
}

fn reading_from_row(row: &SqliteRow) -> Result<VitalReading> {
    Ok(VitalReading {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        timestamp: timestamp_from(row.try_get("timestamp")?)?,
        heart_rate: row.try_get("heart_rate")?,
        spo2: row.try_get("spo2")?,
        temperature: row.try_get("temperature")?,
        blood_pressure_systolic: row.try_get("blood_pressure_systolic")?,
        blood_pressure_diastolic: row.try_get("blood_pressure_diastolic")?,
        respiratory_rate: row.try_get("respiratory_rate")?,
        source: VitalSource::from_str(row.try_get::<String, _>("source")?.as_str())?,
        device_id: row.try_get("device_id")?,
        is_anomaly: row.try_get("is_anomaly")?,
        anomaly_score: row.try_get("anomaly_score")?,
    })
}

fn bounds_from_row(row: &SqliteRow) -> Result<ThresholdBounds> {
    Ok(ThresholdBounds {
        min_warning: row.try_get("min_warning")?,
        max_warning: row.try_get("max_warning")?,
        min_critical: row.try_get("min_critical")?,
        max_critical: row.try_get("max_critical")?,
    })
}

fn threshold_from_row(row: &SqliteRow) -> Result<AlertThreshold> {
    Ok(AlertThreshold {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        vital_type: VitalType::from_str(row.try_get::<String, _>("vital_type")?.as_str())?,
        min_warning: row.try_get("min_warning")?,
        max_warning: row.try_get("max_warning")?,
        min_critical: row.try_get("min_critical")?,
        max_critical: row.try_get("max_critical")?,
        created_at: timestamp_from(row.try_get("created_at")?)?,
    })
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert> {
    let vital_type: Option<String> = row.try_get("vital_type")?;
    let acknowledged_at: Option<i64> = row.try_get("acknowledged_at")?;
    Ok(Alert {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        vital_reading_id: row.try_get("vital_reading_id")?,
        alert_type: AlertType::from_str(row.try_get::<String, _>("alert_type")?.as_str())?,
        severity: AlertSeverity::from_str(row.try_get::<String, _>("severity")?.as_str())?,
        message: row.try_get("message")?,
        vital_type: vital_type.as_deref().map(VitalType::from_str).transpose()?,
        vital_value: row.try_get("vital_value")?,
        threshold_breached: row.try_get("threshold_breached")?,
        is_acknowledged: row.try_get("is_acknowledged")?,
        acknowledged_by: row.try_get("acknowledged_by")?,
        acknowledged_at: acknowledged_at.map(timestamp_from).transpose()?,
        notification_sent: row.try_get("notification_sent")?,
        notification_channels: row.try_get("notification_channels")?,
        created_at: timestamp_from(row.try_get("created_at")?)?,
    })
}

fn medication_from_row(row: &SqliteRow) -> Result<Medication> {
    Ok(Medication {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        name: row.try_get("name")?,
        dosage: row.try_get("dosage")?,
        is_active: row.try_get("is_active")?,
    })
}

fn medication_log_from_row(row: &SqliteRow) -> Result<MedicationLog> {
    let taken_time: Option<i64> = row.try_get("taken_time")?;
    Ok(MedicationLog {
        id: row.try_get("id")?,
        medication_id: row.try_get("medication_id")?,
        patient_id: row.try_get("patient_id")?,
        scheduled_time: timestamp_from(row.try_get("scheduled_time")?)?,
        taken_time: taken_time.map(timestamp_from).transpose()?,
        status: MedicationStatus::from_str(row.try_get::<String, _>("status")?.as_str())?,
    })
}
