//! Synthetic vital-sign stream generator.
//!
//! Stands in for device telemetry: per patient, each channel walks inside a
//! named range, never stepping more than 15% of the selected range's width
//! from the previous value. A patient's free-text condition biases a subset
//! of channels toward abnormal ranges with fixed probabilities. Payloads
//! are shaped exactly like sensor-gateway input, so real devices can
//! replace this component without touching anything downstream.

use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

use crate::models::{Patient, VitalPayload, VitalSource, VitalType};

/// Maximum per-step deviation as a fraction of the selected range's width.
const MAX_STEP_FRACTION: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalRange {
    pub min: f64,
    pub max: f64,
}

impl VitalRange {
    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// Named ranges per channel; the first entry is always the normal range.
pub fn bands(vital: VitalType) -> &'static [(&'static str, VitalRange)] {
    match vital {
        VitalType::HeartRate => &[
            ("normal", VitalRange { min: 60.0, max: 100.0 }),
            ("elevated", VitalRange { min: 100.0, max: 120.0 }),
            ("low", VitalRange { min: 45.0, max: 60.0 }),
        ],
        VitalType::Temperature => &[
            ("normal", VitalRange { min: 36.1, max: 37.2 }),
            ("fever", VitalRange { min: 37.5, max: 39.0 }),
            ("low", VitalRange { min: 35.0, max: 36.0 }),
        ],
        VitalType::Spo2 => &[
            ("normal", VitalRange { min: 95.0, max: 100.0 }),
            ("low", VitalRange { min: 88.0, max: 94.0 }),
            ("critical", VitalRange { min: 82.0, max: 88.0 }),
        ],
        VitalType::BloodPressureSystolic => &[
            ("normal", VitalRange { min: 110.0, max: 130.0 }),
            ("high", VitalRange { min: 130.0, max: 160.0 }),
            ("low", VitalRange { min: 85.0, max: 110.0 }),
        ],
        VitalType::BloodPressureDiastolic => &[
            ("normal", VitalRange { min: 70.0, max: 85.0 }),
            ("high", VitalRange { min: 85.0, max: 100.0 }),
            ("low", VitalRange { min: 55.0, max: 70.0 }),
        ],
        VitalType::RespiratoryRate => &[
            ("normal", VitalRange { min: 12.0, max: 20.0 }),
            ("elevated", VitalRange { min: 20.0, max: 30.0 }),
            ("low", VitalRange { min: 8.0, max: 12.0 }),
        ],
    }
}

fn band_range(vital: VitalType, name: &str) -> VitalRange {
    let table = bands(vital);
    table
        .iter()
        .find(|(band, _)| *band == name)
        .map(|(_, range)| *range)
        .unwrap_or(table[0].1)
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileBias {
    pub vital: VitalType,
    pub band: &'static str,
    pub probability: f64,
}

/// Ordered condition-profile table. Lookup is a case-insensitive substring
/// match over the patient's condition summary; first match wins, and an
/// unmatched condition gets no biases.
pub static CONDITION_PROFILES: &[(&str, &[ProfileBias])] = &[
    (
        "Hypertension",
        &[
            ProfileBias { vital: VitalType::HeartRate, band: "elevated", probability: 0.3 },
            ProfileBias { vital: VitalType::BloodPressureSystolic, band: "high", probability: 0.4 },
            ProfileBias { vital: VitalType::BloodPressureDiastolic, band: "high", probability: 0.4 },
        ],
    ),
    (
        "COPD",
        &[
            ProfileBias { vital: VitalType::Spo2, band: "low", probability: 0.4 },
            ProfileBias { vital: VitalType::RespiratoryRate, band: "elevated", probability: 0.3 },
        ],
    ),
    (
        "Heart Failure",
        &[
            ProfileBias { vital: VitalType::HeartRate, band: "elevated", probability: 0.3 },
            ProfileBias { vital: VitalType::Spo2, band: "low", probability: 0.3 },
        ],
    ),
    (
        "Diabetes",
        &[ProfileBias { vital: VitalType::Temperature, band: "normal", probability: 0.1 }],
    ),
    (
        "Post-Surgery",
        &[
            ProfileBias { vital: VitalType::HeartRate, band: "elevated", probability: 0.2 },
            ProfileBias { vital: VitalType::Temperature, band: "fever", probability: 0.15 },
        ],
    ),
];

pub(crate) fn profile_for(condition: Option<&str>) -> &'static [ProfileBias] {
    let Some(condition) = condition else { return &[] };
    let condition = condition.to_lowercase();
    for (name, biases) in CONDITION_PROFILES {
        if condition.contains(&name.to_lowercase()) {
            return biases;
        }
    }
    &[]
}

/// Per-patient stream generator state. Keyed storage is owned here and
/// never leaves the component; the scheduler is the only caller of
/// [`VitalSimulator::generate`], keeping the last-value state coherent.
#[derive(Default)]
pub struct VitalSimulator {
    states: DashMap<i64, HashMap<VitalType, f64>>,
}

impl VitalSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next reading payload for a patient, advancing the
    /// per-channel continuity state.
    pub fn generate(&self, patient: &Patient) -> VitalPayload {
        let profile = profile_for(patient.condition_summary.as_deref());
        let mut rng = rand::thread_rng();
        let mut state = self.states.entry(patient.id).or_default();

        let mut next = |vital: VitalType| {
            let prev = state.get(&vital).copied();
            let value = generate_value(&mut rng, vital, profile, prev);
            state.insert(vital, value);
            value
        };

        let heart_rate = next(VitalType::HeartRate);
        let temperature = next(VitalType::Temperature);
        let spo2 = next(VitalType::Spo2);
        let bp_systolic = next(VitalType::BloodPressureSystolic);
        let bp_diastolic = next(VitalType::BloodPressureDiastolic);
        let respiratory_rate = next(VitalType::RespiratoryRate);

        debug!(patient_id = patient.id, heart_rate, spo2, temperature, "generated vitals");

        VitalPayload {
            patient_id: patient.id,
            timestamp: Utc::now(),
            heart_rate,
            spo2,
            temperature,
            blood_pressure_systolic: bp_systolic as i64,
            blood_pressure_diastolic: bp_diastolic as i64,
            respiratory_rate,
            source: VitalSource::Simulated,
            device_id: device_id_for(patient.id),
        }
    }
}

/// Synthetic device identifier, deterministic per patient.
pub fn device_id_for(patient_id: i64) -> String {
    format!("SIM-DEVICE-{patient_id:04}")
}

fn generate_value(
    rng: &mut impl Rng,
    vital: VitalType,
    profile: &[ProfileBias],
    prev: Option<f64>,
) -> f64 {
    let mut band = "normal";
    if let Some(bias) = profile.iter().find(|b| b.vital == vital) {
        if rng.gen::<f64>() < bias.probability {
            band = bias.band;
        }
    }
    let range = band_range(vital, band);

    let value = match prev {
        Some(prev) => {
            let delta = range.width() * MAX_STEP_FRACTION;
            let lo = range.min.max(prev - delta);
            let hi = range.max.min(prev + delta);
            if lo <= hi {
                rng.gen_range(lo..=hi)
            } else if prev > range.max {
                // A band switch left the previous value outside the new
                // band; step toward it rather than jumping.
                prev - delta
            } else {
                prev + delta
            }
        }
        None => rng.gen_range(range.min..=range.max),
    };

    round_for(vital, value)
}

fn round_for(vital: VitalType, value: f64) -> f64 {
    match vital {
        VitalType::Temperature => (value * 10.0).round() / 10.0,
        _ => value.round(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;

    fn patient(id: i64, condition: Option<&str>) -> Patient {
        Patient {
            id,
            full_name: format!("Patient {id}"),
            condition_summary: condition.map(str::to_string),
            risk_level: RiskLevel::Medium,
            created_at: Utc::now(),
        }
    }

    fn max_step(vital: VitalType) -> f64 {
        bands(vital)
            .iter()
            .map(|(_, r)| r.width() * MAX_STEP_FRACTION)
            .fold(0.0, f64::max)
    }

    #[test]
    fn profile_lookup_is_substring_and_case_insensitive() {
        assert!(profile_for(None).is_empty());
        assert!(profile_for(Some("stable recovery")).is_empty());

        let copd = profile_for(Some("severe copd, oxygen at home"));
        assert!(copd.iter().any(|b| b.vital == VitalType::Spo2 && b.band == "low"));

        // First match in table order wins.
        let mixed = profile_for(Some("Hypertension with heart failure"));
        assert!(mixed.iter().any(|b| b.vital == VitalType::BloodPressureSystolic));
    }

    #[test]
    fn consecutive_values_stay_within_step_bound() {
        let sim = VitalSimulator::new();
        // A biased profile forces band switches, the hardest case.
        let p = patient(1, Some("COPD"));

        let mut prev: HashMap<VitalType, f64> = HashMap::new();
        for _ in 0..300 {
            let payload = sim.generate(&p);
            let values = [
                (VitalType::HeartRate, payload.heart_rate),
                (VitalType::Temperature, payload.temperature),
                (VitalType::Spo2, payload.spo2),
                (VitalType::BloodPressureSystolic, payload.blood_pressure_systolic as f64),
                (VitalType::BloodPressureDiastolic, payload.blood_pressure_diastolic as f64),
                (VitalType::RespiratoryRate, payload.respiratory_rate),
            ];
            for (vital, value) in values {
                if let Some(last) = prev.get(&vital) {
                    let step = (value - last).abs();
                    // Rounding can add at most half a unit on either side.
                    assert!(
                        step <= max_step(vital) + 1.0,
                        "{vital} jumped {step} (bound {})",
                        max_step(vital)
                    );
                }
                prev.insert(vital, value);
            }
        }
    }

    #[test]
    fn unbiased_patient_stays_in_normal_ranges() {
        let sim = VitalSimulator::new();
        let p = patient(2, None);
        for _ in 0..100 {
            let payload = sim.generate(&p);
            let normal_hr = bands(VitalType::HeartRate)[0].1;
            assert!(payload.heart_rate >= normal_hr.min && payload.heart_rate <= normal_hr.max);
            let normal_spo2 = bands(VitalType::Spo2)[0].1;
            assert!(payload.spo2 >= normal_spo2.min && payload.spo2 <= normal_spo2.max);
        }
    }

    #[test]
    fn rounding_rules_per_channel() {
        let sim = VitalSimulator::new();
        let p = patient(3, None);
        for _ in 0..50 {
            let payload = sim.generate(&p);
            assert_eq!(payload.heart_rate, payload.heart_rate.round());
            assert_eq!(payload.spo2, payload.spo2.round());
            assert_eq!(payload.respiratory_rate, payload.respiratory_rate.round());
            let tenths = payload.temperature * 10.0;
            assert!((tenths - tenths.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn payload_is_device_shaped() {
        let sim = VitalSimulator::new();
        let payload = sim.generate(&patient(42, None));
        assert_eq!(payload.device_id, "SIM-DEVICE-0042");
        assert_eq!(payload.source, VitalSource::Simulated);
        assert_eq!(payload.patient_id, 42);
    }
}
