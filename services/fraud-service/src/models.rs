use fraud_engine::AlertStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ===== Alert Review =====

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertRequest {
    /// RESOLVED when absent
    #[serde(default)]
    pub status: Option<AlertStatus>,
    pub action: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAlertsQuery {
    pub user_id: Option<Uuid>,
}

// ===== Checks =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAccepted {
    pub transaction_id: Uuid,
    pub status: String,
}

// ===== Health =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: String,
    pub queued_checks: usize,
    pub uptime_seconds: u64,
}
