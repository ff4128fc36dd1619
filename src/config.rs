//! Environment-driven settings.
//!
//! Values come from `VITALGUARD_*` environment variables (a `.env` file is
//! honored when the binary loads one), with defaults matching the
//! reference deployment.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    /// Seconds between ingestion cycles.
    pub simulation_interval_secs: u64,
    /// Minutes past a dose's scheduled time before it counts as missed.
    pub medication_grace_minutes: i64,
    /// Trailing window, in minutes, for risk-level alert counts.
    pub risk_window_minutes: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "sqlite://vitalguard.db".to_string(),
            simulation_interval_secs: 8,
            medication_grace_minutes: 30,
            risk_window_minutes: 60,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Settings {
            database_url: std::env::var("VITALGUARD_DATABASE_URL")
                .unwrap_or(defaults.database_url),
            simulation_interval_secs: env_parse(
                "VITALGUARD_SIMULATION_INTERVAL_SECS",
                defaults.simulation_interval_secs,
            ),
            medication_grace_minutes: env_parse(
                "VITALGUARD_MEDICATION_GRACE_MINUTES",
                defaults.medication_grace_minutes,
            ),
            risk_window_minutes: env_parse(
                "VITALGUARD_RISK_WINDOW_MINUTES",
                defaults.risk_window_minutes,
            ),
        }
    }

    pub fn simulation_interval(&self) -> Duration {
        Duration::from_secs(self.simulation_interval_secs)
    }

    pub fn medication_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.medication_grace_minutes)
    }

    pub fn risk_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.risk_window_minutes)
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparseable setting, using default");
            default
        }),
        Err(_) => default,
    }
}
