//! Core types for the fraud engine

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Severity tier, ranked LOW < MEDIUM < HIGH < CRITICAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Low severity
    Low,
    /// Medium severity
    Medium,
    /// High severity
    High,
    /// Critical severity, blocks the transaction
    Critical,
}

impl Severity {
    /// Numeric rank used for ordering
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    /// Persisted/wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(Error::Storage(format!("Unknown severity: {}", other))),
        }
    }
}

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Wallet top-up
    Topup,
    /// Peer-to-peer transfer
    Transfer,
    /// Withdrawal to an external account
    Withdrawal,
    /// Marketplace payment
    Payment,
    /// Refund
    Refund,
}

impl TransactionType {
    /// Persisted/wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Topup => "TOPUP",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Refund => "REFUND",
        }
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TOPUP" => Ok(TransactionType::Topup),
            "TRANSFER" => Ok(TransactionType::Transfer),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "PAYMENT" => Ok(TransactionType::Payment),
            "REFUND" => Ok(TransactionType::Refund),
            other => Err(Error::Storage(format!("Unknown transaction type: {}", other))),
        }
    }
}

/// Transaction status on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Awaiting completion
    Pending,
    /// Completed successfully
    Completed,
    /// Failed
    Failed,
    /// Cancelled (blocked by fraud checks or by the user)
    Cancelled,
}

impl TransactionStatus {
    /// Persisted/wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    /// Failed and cancelled transactions are never cancelled again.
    /// Completed ones still can be: a fraud block reverses them downstream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Failed | TransactionStatus::Cancelled)
    }
}

impl FromStr for TransactionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            other => Err(Error::Storage(format!("Unknown transaction status: {}", other))),
        }
    }
}

/// Metadata key carrying the transfer recipient
pub const META_RECIPIENT_ID: &str = "recipientId";

/// Metadata key carrying the client location
pub const META_LOCATION: &str = "location";

/// Request to check a single transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    /// User who owns the transaction
    pub user_id: Uuid,

    /// Transaction being checked
    pub transaction_id: Uuid,

    /// Transaction type
    pub transaction_type: TransactionType,

    /// Amount in minor currency units
    pub amount: i64,

    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,

    /// Open metadata (recipientId, location, ...)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CheckRequest {
    /// Create a request without description or metadata
    pub fn new(
        user_id: Uuid,
        transaction_id: Uuid,
        transaction_type: TransactionType,
        amount: i64,
    ) -> Self {
        Self {
            user_id,
            transaction_id,
            transaction_type,
            amount,
            description: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Recipient id, if present in metadata
    pub fn recipient_id(&self) -> Option<&serde_json::Value> {
        self.metadata.get(META_RECIPIENT_ID)
    }

    /// Location, if present in metadata
    pub fn location(&self) -> Option<&serde_json::Value> {
        self.metadata.get(META_LOCATION)
    }
}

/// A transaction from the user's ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub status: TransactionStatus,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Location, if present in metadata
    pub fn location(&self) -> Option<&serde_json::Value> {
        self.metadata.get(META_LOCATION)
    }
}

/// An outgoing transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Wallet state at the time history was loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub user_id: Uuid,
    pub balance: i64,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

/// A failed login attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedLogin {
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Bounded window of recent user activity, computed fresh per check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHistory {
    /// Instant the history was loaded; time windows are measured from here
    pub as_of: DateTime<Utc>,

    /// Transactions in the last hour, newest first
    pub recent_transactions: Vec<TransactionRecord>,

    /// Outgoing transfers in the last hour, newest first
    pub sent_transfers: Vec<TransferRecord>,

    /// Current wallet, if the user has one
    pub wallet: Option<WalletSnapshot>,

    /// Mean amount of successful transactions over the trailing 30 days
    pub average_transaction_amount: f64,

    /// Recipient blacklist hit. No data source feeds this yet; always false.
    pub is_blacklisted_recipient: bool,

    /// Failed login attempts. No data source feeds this yet; always empty.
    pub failed_logins: Vec<FailedLogin>,
}

impl UserHistory {
    /// Empty history as of the given instant
    pub fn empty(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            recent_transactions: Vec::new(),
            sent_transfers: Vec::new(),
            wallet: None,
            average_transaction_amount: 0.0,
            is_blacklisted_recipient: false,
            failed_logins: Vec::new(),
        }
    }
}

/// Review status of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    /// Awaiting review
    Open,
    /// Reviewed and acted upon
    Resolved,
    /// Reviewed and judged benign
    Dismissed,
}

impl AlertStatus {
    /// Persisted/wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "OPEN",
            AlertStatus::Resolved => "RESOLVED",
            AlertStatus::Dismissed => "DISMISSED",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(AlertStatus::Open),
            "RESOLVED" => Ok(AlertStatus::Resolved),
            "DISMISSED" => Ok(AlertStatus::Dismissed),
            other => Err(Error::Storage(format!("Unknown alert status: {}", other))),
        }
    }
}

/// Persisted fraud alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudAlert {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Transaction that produced the alert
    pub transaction_id: Uuid,

    pub severity: Severity,
    pub status: AlertStatus,

    /// Triggered rules' descriptions, joined
    pub description: String,

    /// Triggered rule names, joined
    #[serde(rename = "rule")]
    pub rule_names: String,

    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub action: Option<String>,
}

/// Fields written when an alert is reviewed
#[derive(Debug, Clone, PartialEq)]
pub struct AlertUpdate {
    pub status: AlertStatus,
    pub action: String,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
}

/// Filter for counting alerts; `None` fields match everything
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub severity: Option<Severity>,
}

impl AlertFilter {
    /// Match every alert
    pub fn all() -> Self {
        Self::default()
    }

    /// Match alerts with the given status
    pub fn status(status: AlertStatus) -> Self {
        Self {
            status: Some(status),
            severity: None,
        }
    }

    /// Match alerts with the given severity
    pub fn severity(severity: Severity) -> Self {
        Self {
            status: None,
            severity: Some(severity),
        }
    }

    /// Whether the alert satisfies this filter
    pub fn matches(&self, alert: &FraudAlert) -> bool {
        self.status.map_or(true, |s| alert.status == s)
            && self.severity.map_or(true, |s| alert.severity == s)
    }
}

/// Aggregate alert statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatistics {
    pub total: u64,
    pub open: u64,
    pub resolved: u64,
    pub dismissed: u64,
    pub critical: u64,
    /// resolved / total * 100, or 0 when there are no alerts
    pub resolution_rate: f64,
}

/// Result of storing an alert; a transaction has at most one alert
#[derive(Debug, Clone, PartialEq)]
pub enum AlertInsert {
    /// The alert was stored
    Created(FraudAlert),
    /// An alert for the same transaction already existed; nothing was stored
    Existing(FraudAlert),
}

impl AlertInsert {
    /// Whether this call stored the alert
    pub fn is_created(&self) -> bool {
        matches!(self, AlertInsert::Created(_))
    }

    /// The stored alert, new or existing
    pub fn into_alert(self) -> FraudAlert {
        match self {
            AlertInsert::Created(alert) | AlertInsert::Existing(alert) => alert,
        }
    }
}

/// Result of a conditional alert review
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewUpdate {
    /// Alert was OPEN and now carries the review
    Applied(FraudAlert),
    /// Alert was already reviewed; nothing changed
    NotOpen(AlertStatus),
    /// Alert does not exist
    NotFound,
}

/// Result of a conditional transaction status update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Status was changed
    Applied,
    /// Transaction was already terminal; nothing changed
    AlreadyTerminal(TransactionStatus),
    /// Transaction does not exist
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering_is_by_rank() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);

        let highest = [Severity::High, Severity::Critical, Severity::Medium]
            .into_iter()
            .max()
            .unwrap();
        assert_eq!(highest, Severity::Critical);
    }

    #[test]
    fn test_severity_string_round_trip() {
        for severity in [Severity::Low, Severity::Medium, Severity::High, Severity::Critical] {
            assert_eq!(severity.as_str().parse::<Severity>().unwrap(), severity);
        }
        assert!("SEVERE".parse::<Severity>().is_err());
    }

    #[test]
    fn test_check_request_deserializes_camel_case() {
        let json = r#"{
            "userId": "8f14e45f-ceea-467f-a0e6-7c9e7b0d7a3d",
            "transactionId": "c9f0f895-fb98-4b91-9e6a-2a8f6f2c8d11",
            "transactionType": "TRANSFER",
            "amount": 5000,
            "description": "rent",
            "metadata": {"recipientId": "abc", "location": "Lagos"}
        }"#;

        let request: CheckRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.transaction_type, TransactionType::Transfer);
        assert_eq!(request.amount, 5000);
        assert_eq!(request.location(), Some(&serde_json::json!("Lagos")));
    }

    #[test]
    fn test_alert_filter_matches() {
        let alert = FraudAlert {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            severity: Severity::Critical,
            status: AlertStatus::Open,
            description: String::new(),
            rule_names: String::new(),
            created_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            action: None,
        };

        assert!(AlertFilter::all().matches(&alert));
        assert!(AlertFilter::status(AlertStatus::Open).matches(&alert));
        assert!(!AlertFilter::status(AlertStatus::Resolved).matches(&alert));
        assert!(AlertFilter::severity(Severity::Critical).matches(&alert));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }
}
