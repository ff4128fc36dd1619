use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationStatus {
    Pending,
    Taken,
    Missed,
    Skipped,
}

impl MedicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedicationStatus::Pending => "pending",
            MedicationStatus::Taken => "taken",
            MedicationStatus::Missed => "missed",
            MedicationStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for MedicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MedicationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MedicationStatus::Pending),
            "taken" => Ok(MedicationStatus::Taken),
            "missed" => Ok(MedicationStatus::Missed),
            "skipped" => Ok(MedicationStatus::Skipped),
            other => Err(anyhow!("unknown medication status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: i64,
    pub patient_id: i64,
    pub name: String,
    pub dosage: Option<String>,
    pub is_active: bool,
}

/// One scheduled dose. The core's only transition is pending -> missed,
/// applied by the scheduler sweep once the grace period has elapsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationLog {
    pub id: i64,
    pub medication_id: i64,
    pub patient_id: i64,
    pub scheduled_time: DateTime<Utc>,
    pub taken_time: Option<DateTime<Utc>>,
    pub status: MedicationStatus,
}
