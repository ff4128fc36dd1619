//! Outbound notification seam.
//!
//! Delivery itself (WhatsApp/SMS gateway, recipient lists) lives outside
//! the core. The contract here: dispatch never raises to the caller, and
//! the outcome is reported so the alert row can record whether anyone was
//! actually notified.

use async_trait::async_trait;
use tracing::info;

use crate::models::{AlertSeverity, VitalType};

/// Result of a dispatch attempt. `sent: false` means the alert still
/// stands; it is surfaced as "notification not sent" rather than hidden.
#[derive(Debug, Clone)]
pub struct NotificationOutcome {
    pub sent: bool,
    pub channel: Option<String>,
}

impl NotificationOutcome {
    pub fn not_sent() -> Self {
        NotificationOutcome { sent: false, channel: None }
    }
}

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Dispatch a critical-breach notification. Implementations must
    /// swallow transport failures and report them via the outcome.
    async fn send_critical_alert(
        &self,
        patient_name: &str,
        vital_type: VitalType,
        vital_value: f64,
        severity: AlertSeverity,
    ) -> NotificationOutcome;
}

/// Log-only notifier used when no gateway is configured. Reports success
/// on the `whatsapp` channel so the rest of the pipeline behaves exactly
/// as it would in production.
#[derive(Debug, Default)]
pub struct LogOnlyNotifier;

#[async_trait]
impl AlertNotifier for LogOnlyNotifier {
    async fn send_critical_alert(
        &self,
        patient_name: &str,
        vital_type: VitalType,
        vital_value: f64,
        severity: AlertSeverity,
    ) -> NotificationOutcome {
        info!(
            patient_name,
            vital = %vital_type,
            value = vital_value,
            severity = %severity,
            "notification gateway not configured; alert logged only"
        );
        NotificationOutcome {
            sent: true,
            channel: Some("whatsapp".to_string()),
        }
    }
}
