use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::vital::VitalType;

/// Ordered severity tiers: info < warning < critical < emergency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
            AlertSeverity::Emergency => "emergency",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(AlertSeverity::Info),
            "warning" => Ok(AlertSeverity::Warning),
            "critical" => Ok(AlertSeverity::Critical),
            "emergency" => Ok(AlertSeverity::Emergency),
            other => Err(anyhow!("unknown alert severity: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    VitalWarning,
    VitalCritical,
    MedicationMissed,
    AnomalyDetected,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::VitalWarning => "vital_warning",
            AlertType::VitalCritical => "vital_critical",
            AlertType::MedicationMissed => "medication_missed",
            AlertType::AnomalyDetected => "anomaly_detected",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vital_warning" => Ok(AlertType::VitalWarning),
            "vital_critical" => Ok(AlertType::VitalCritical),
            "medication_missed" => Ok(AlertType::MedicationMissed),
            "anomaly_detected" => Ok(AlertType::AnomalyDetected),
            other => Err(anyhow!("unknown alert type: {other}")),
        }
    }
}

/// A clinical alert. Created only by the evaluation paths; the one
/// permitted mutation afterwards is acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub patient_id: i64,
    pub vital_reading_id: Option<i64>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub vital_type: Option<VitalType>,
    pub vital_value: Option<f64>,
    pub threshold_breached: Option<f64>,
    pub is_acknowledged: bool,
    pub acknowledged_by: Option<i64>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub notification_sent: bool,
    pub notification_channels: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// A fresh, unacknowledged alert with no notification record.
    pub fn new(patient_id: i64, alert_type: AlertType, severity: AlertSeverity, message: String) -> Self {
        Alert {
            id: 0,
            patient_id,
            vital_reading_id: None,
            alert_type,
            severity,
            message,
            vital_type: None,
            vital_value: None,
            threshold_breached: None,
            is_acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            notification_sent: false,
            notification_channels: None,
            created_at: Utc::now(),
        }
    }
}
