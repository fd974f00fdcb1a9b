//! Data access consumed by the fraud engine

use crate::types::{
    AlertFilter, AlertInsert, AlertUpdate, FraudAlert, ReviewUpdate, StatusUpdate,
    TransactionRecord, TransactionStatus, TransferRecord, WalletSnapshot,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Persistence layer behind the fraud engine.
///
/// Implementations report failures as `Error::Storage`.
#[async_trait]
pub trait FraudRepository: Send + Sync {
    /// Transactions created at or after `since`, newest first
    async fn recent_transactions(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>>;

    /// Outgoing transfers created at or after `since`, newest first
    async fn recent_transfers(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransferRecord>>;

    /// Current wallet of the user
    async fn wallet(&self, user_id: Uuid) -> Result<Option<WalletSnapshot>>;

    /// Completed transactions created at or after `since`
    async fn successful_transactions(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>>;

    /// Persist a new alert unless the transaction already has one. The check
    /// and the insert are a single atomic step.
    async fn create_alert(&self, alert: &FraudAlert) -> Result<AlertInsert>;

    /// Set the status unless the transaction is already terminal
    async fn update_transaction_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> Result<StatusUpdate>;

    /// Alert by id
    async fn find_alert(&self, alert_id: Uuid) -> Result<Option<FraudAlert>>;

    /// Apply review fields if the alert is still OPEN, atomically
    async fn update_alert(&self, alert_id: Uuid, update: AlertUpdate) -> Result<ReviewUpdate>;

    /// Alerts newest first, optionally for one user
    async fn list_alerts(&self, user_id: Option<Uuid>, limit: usize) -> Result<Vec<FraudAlert>>;

    /// Number of alerts matching the filter
    async fn count_alerts(&self, filter: AlertFilter) -> Result<u64>;
}
