//! Threshold bands and the pure breach evaluator.
//!
//! A band is four optional bounds. Evaluation checks critical bounds before
//! warning bounds, low before high, and the first breached bound wins; an
//! absent bound never triggers.

use chrono::Utc;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AlertSeverity, AlertThreshold, VitalType};

/// System-wide default bands, copied into per-patient records at
/// onboarding so later edits to this table never retroactively change an
/// existing patient's configuration.
pub static DEFAULT_THRESHOLDS: Lazy<Vec<(VitalType, ThresholdBounds)>> = Lazy::new(|| {
    vec![
        (
            VitalType::HeartRate,
            ThresholdBounds {
                min_warning: Some(50.0),
                max_warning: Some(100.0),
                min_critical: Some(40.0),
                max_critical: Some(120.0),
            },
        ),
        (
            VitalType::Spo2,
            ThresholdBounds {
                min_warning: Some(92.0),
                max_warning: None,
                min_critical: Some(88.0),
                max_critical: None,
            },
        ),
        (
            VitalType::Temperature,
            ThresholdBounds {
                min_warning: Some(36.0),
                max_warning: Some(37.5),
                min_critical: Some(35.0),
                max_critical: Some(38.5),
            },
        ),
    ]
});

#[derive(Debug, Error)]
pub enum ThresholdError {
    #[error("invalid threshold bounds for {vital}: {reason}")]
    InvalidBounds { vital: VitalType, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBounds {
    pub min_warning: Option<f64>,
    pub max_warning: Option<f64>,
    pub min_critical: Option<f64>,
    pub max_critical: Option<f64>,
}

impl ThresholdBounds {
    /// Requires `min_critical <= min_warning <= max_warning <= max_critical`
    /// for every pair where both sides are present.
    pub fn validate(&self, vital: VitalType) -> Result<(), ThresholdError> {
        let ordered = [
            ("min_critical", self.min_critical, "min_warning", self.min_warning),
            ("min_warning", self.min_warning, "max_warning", self.max_warning),
            ("max_warning", self.max_warning, "max_critical", self.max_critical),
            ("min_critical", self.min_critical, "max_critical", self.max_critical),
        ];
        for (lo_name, lo, hi_name, hi) in ordered {
            if let (Some(lo), Some(hi)) = (lo, hi) {
                if lo > hi {
                    return Err(ThresholdError::InvalidBounds {
                        vital,
                        reason: format!("{lo_name} ({lo}) exceeds {hi_name} ({hi})"),
                    });
                }
            }
        }
        Ok(())
    }
}

impl From<&AlertThreshold> for ThresholdBounds {
    fn from(t: &AlertThreshold) -> Self {
        ThresholdBounds {
            min_warning: t.min_warning,
            max_warning: t.max_warning,
            min_critical: t.min_critical,
            max_critical: t.max_critical,
        }
    }
}

/// Which bound a value crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
    BelowCritical,
    AboveCritical,
    BelowWarning,
    AboveWarning,
}

impl BreachKind {
    pub fn is_low(&self) -> bool {
        matches!(self, BreachKind::BelowCritical | BreachKind::BelowWarning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breach {
    pub severity: AlertSeverity,
    pub kind: BreachKind,
    pub threshold: f64,
}

/// Evaluate a value against a band. Returns `None` when the value is absent
/// or inside every configured bound. Check order is fixed: critical-low,
/// critical-high, warning-low, warning-high.
pub fn check_threshold(value: Option<f64>, bounds: &ThresholdBounds) -> Option<Breach> {
    let value = value?;

    if let Some(min) = bounds.min_critical {
        if value < min {
            return Some(Breach {
                severity: AlertSeverity::Critical,
                kind: BreachKind::BelowCritical,
                threshold: min,
            });
        }
    }
    if let Some(max) = bounds.max_critical {
        if value > max {
            return Some(Breach {
                severity: AlertSeverity::Critical,
                kind: BreachKind::AboveCritical,
                threshold: max,
            });
        }
    }
    if let Some(min) = bounds.min_warning {
        if value < min {
            return Some(Breach {
                severity: AlertSeverity::Warning,
                kind: BreachKind::BelowWarning,
                threshold: min,
            });
        }
    }
    if let Some(max) = bounds.max_warning {
        if value > max {
            return Some(Breach {
                severity: AlertSeverity::Warning,
                kind: BreachKind::AboveWarning,
                threshold: max,
            });
        }
    }
    None
}

/// System default band for one vital type, if that type has one.
pub fn default_bounds(vital: VitalType) -> Option<ThresholdBounds> {
    DEFAULT_THRESHOLDS
        .iter()
        .find(|(v, _)| *v == vital)
        .map(|(_, b)| *b)
}

/// The records to insert when onboarding a patient: one per entry in the
/// system default table.
pub fn default_thresholds_for(patient_id: i64) -> Vec<AlertThreshold> {
    DEFAULT_THRESHOLDS
        .iter()
        .map(|(vital, bounds)| AlertThreshold {
            id: 0,
            patient_id,
            vital_type: *vital,
            min_warning: bounds.min_warning,
            max_warning: bounds.max_warning,
            min_critical: bounds.min_critical,
            max_critical: bounds.max_critical,
            created_at: Utc::now(),
        })
        .collect()
}
