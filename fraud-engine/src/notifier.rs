//! Best-effort user notification of alerts

use crate::metrics::NOTIFICATION_FAILURES_TOTAL;
use crate::types::Severity;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Notification kind for fraud alerts
pub const FRAUD_ALERT_KIND: &str = "FRAUD_ALERT";

/// User-facing notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub kind: String,
    pub title: String,
    pub message: String,
    pub alert_id: Uuid,
    pub severity: Severity,
}

impl NotificationPayload {
    /// Notice for a fraud alert
    pub fn fraud_alert(alert_id: Uuid, severity: Severity) -> Self {
        let message = match severity {
            Severity::Critical => {
                "We blocked a transaction on your account because it looked suspicious. \
                 Please contact support if this was you."
            }
            _ => "We noticed unusual activity on your account and are reviewing it.",
        };

        Self {
            kind: FRAUD_ALERT_KIND.to_string(),
            title: "Suspicious activity detected".to_string(),
            message: message.to_string(),
            alert_id,
            severity,
        }
    }
}

/// Delivery transport
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notice to the user
    async fn send(&self, user_id: Uuid, payload: NotificationPayload) -> Result<()>;
}

/// Notifier that only writes to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, user_id: Uuid, payload: NotificationPayload) -> Result<()> {
        info!(
            %user_id,
            alert_id = %payload.alert_id,
            severity = %payload.severity,
            "Notification: {}", payload.title
        );
        Ok(())
    }
}

/// Wraps a notifier so failures never escape
pub struct NotificationEmitter {
    notifier: std::sync::Arc<dyn Notifier>,
}

impl NotificationEmitter {
    /// Create new emitter
    pub fn new(notifier: std::sync::Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Send the alert notice; returns whether delivery succeeded
    pub async fn notify(&self, user_id: Uuid, alert_id: Uuid, severity: Severity) -> bool {
        let payload = NotificationPayload::fraud_alert(alert_id, severity);
        match self.notifier.send(user_id, payload).await {
            Ok(()) => true,
            Err(e) => {
                NOTIFICATION_FAILURES_TOTAL.inc();
                warn!(%user_id, %alert_id, "Notification delivery failed: {}", e);
                false
            }
        }
    }
}
