//! VitalGuard monitoring core.
//!
//! Continuous patient vital-sign ingestion: a scheduler drives a synthetic
//! (or real) vital stream through threshold evaluation, alert creation,
//! risk scoring, and real-time fan-out to subscribers. Persistence is
//! SQLite; the REST surface, auth, and outbound messaging gateways live in
//! the hosting application and plug into the seams exposed here.

pub mod alerts;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod simulator;
pub mod thresholds;
