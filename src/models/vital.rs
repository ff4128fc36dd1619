//! Vital sign reading types.
//!
//! A reading is immutable once created; the only field touched after insert
//! is `is_anomaly`, flipped by the ingestion path when evaluation produced
//! at least one alert.

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The vital channels the system knows about. Thresholds are configured for
/// a subset (heart rate, SpO2, temperature); the simulator drives all six.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalType {
    HeartRate,
    Spo2,
    Temperature,
    BloodPressureSystolic,
    BloodPressureDiastolic,
    RespiratoryRate,
}

impl VitalType {
    pub const ALL: [VitalType; 6] = [
        VitalType::HeartRate,
        VitalType::Spo2,
        VitalType::Temperature,
        VitalType::BloodPressureSystolic,
        VitalType::BloodPressureDiastolic,
        VitalType::RespiratoryRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VitalType::HeartRate => "heart_rate",
            VitalType::Spo2 => "spo2",
            VitalType::Temperature => "temperature",
            VitalType::BloodPressureSystolic => "blood_pressure_systolic",
            VitalType::BloodPressureDiastolic => "blood_pressure_diastolic",
            VitalType::RespiratoryRate => "respiratory_rate",
        }
    }

    /// Human-readable name used in alert messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            VitalType::HeartRate => "Heart Rate",
            VitalType::Spo2 => "SpO2",
            VitalType::Temperature => "Temperature",
            VitalType::BloodPressureSystolic => "Systolic BP",
            VitalType::BloodPressureDiastolic => "Diastolic BP",
            VitalType::RespiratoryRate => "Respiratory Rate",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            VitalType::HeartRate => "bpm",
            VitalType::Spo2 => "%",
            VitalType::Temperature => "°C",
            VitalType::BloodPressureSystolic | VitalType::BloodPressureDiastolic => "mmHg",
            VitalType::RespiratoryRate => "breaths/min",
        }
    }
}

impl fmt::Display for VitalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VitalType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heart_rate" => Ok(VitalType::HeartRate),
            "spo2" => Ok(VitalType::Spo2),
            "temperature" => Ok(VitalType::Temperature),
            "blood_pressure_systolic" => Ok(VitalType::BloodPressureSystolic),
            "blood_pressure_diastolic" => Ok(VitalType::BloodPressureDiastolic),
            "respiratory_rate" => Ok(VitalType::RespiratoryRate),
            other => Err(anyhow!("unknown vital type: {other}")),
        }
    }
}

/// Provenance of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalSource {
    Simulated,
    Manual,
    Sensor,
}

impl VitalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VitalSource::Simulated => "simulated",
            VitalSource::Manual => "manual",
            VitalSource::Sensor => "sensor",
        }
    }
}

impl fmt::Display for VitalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VitalSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simulated" => Ok(VitalSource::Simulated),
            "manual" => Ok(VitalSource::Manual),
            "sensor" => Ok(VitalSource::Sensor),
            other => Err(anyhow!("unknown vital source: {other}")),
        }
    }
}

/// A persisted vital-sign reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalReading {
    pub id: i64,
    pub patient_id: i64,
    pub timestamp: DateTime<Utc>,
    pub heart_rate: Option<f64>,
    pub spo2: Option<f64>,
    pub temperature: Option<f64>,
    pub blood_pressure_systolic: Option<i64>,
    pub blood_pressure_diastolic: Option<i64>,
    pub respiratory_rate: Option<f64>,
    pub source: VitalSource,
    pub device_id: Option<String>,
    pub is_anomaly: bool,
    /// Reserved for an anomaly-scoring extension; never set by the core.
    pub anomaly_score: Option<f64>,
}

impl VitalReading {
    /// The value of a single channel, if present on this reading.
    pub fn value(&self, vital: VitalType) -> Option<f64> {
        match vital {
            VitalType::HeartRate => self.heart_rate,
            VitalType::Spo2 => self.spo2,
            VitalType::Temperature => self.temperature,
            VitalType::BloodPressureSystolic => self.blood_pressure_systolic.map(|v| v as f64),
            VitalType::BloodPressureDiastolic => self.blood_pressure_diastolic.map(|v| v as f64),
            VitalType::RespiratoryRate => self.respiratory_rate,
        }
    }
}

/// Device-shaped payload emitted by the stream generator. Matches what a
/// real sensor gateway would submit, so swapping simulation for hardware
/// changes nothing downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalPayload {
    pub patient_id: i64,
    pub timestamp: DateTime<Utc>,
    pub heart_rate: f64,
    pub spo2: f64,
    pub temperature: f64,
    pub blood_pressure_systolic: i64,
    pub blood_pressure_diastolic: i64,
    pub respiratory_rate: f64,
    pub source: VitalSource,
    pub device_id: String,
}

impl From<VitalPayload> for VitalReading {
    fn from(p: VitalPayload) -> Self {
        VitalReading {
            id: 0,
            patient_id: p.patient_id,
            timestamp: p.timestamp,
            heart_rate: Some(p.heart_rate),
            spo2: Some(p.spo2),
            temperature: Some(p.temperature),
            blood_pressure_systolic: Some(p.blood_pressure_systolic),
            blood_pressure_diastolic: Some(p.blood_pressure_diastolic),
            respiratory_rate: Some(p.respiratory_rate),
            source: p.source,
            device_id: Some(p.device_id),
            is_anomaly: false,
            anomaly_score: None,
        }
    }
}
