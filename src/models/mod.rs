pub mod alert;
pub mod medication;
pub mod patient;
pub mod vital;

pub use alert::{Alert, AlertSeverity, AlertType};
pub use medication::{Medication, MedicationLog, MedicationStatus};
pub use patient::{AlertThreshold, Patient, RiskLevel};
pub use vital::{VitalPayload, VitalReading, VitalSource, VitalType};
