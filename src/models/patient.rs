use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::vital::VitalType;

/// Derived patient-level aggregate summarizing recent alert activity.
/// Recomputed by the risk scorer; new patients start at `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(anyhow!("unknown risk level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub full_name: String,
    /// Free-text condition summary; the stream generator matches profile
    /// names against it to bias simulated values.
    pub condition_summary: Option<String>,
    pub risk_level: RiskLevel,
    pub created_at: DateTime<Utc>,
}

/// Per-(patient, vital-type) alert band configuration. Any bound may be
/// absent, meaning no limit on that side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThreshold {
    pub id: i64,
    pub patient_id: i64,
    pub vital_type: VitalType,
    pub min_warning: Option<f64>,
    pub max_warning: Option<f64>,
    pub min_critical: Option<f64>,
    pub max_critical: Option<f64>,
    pub created_at: DateTime<Utc>,
}
