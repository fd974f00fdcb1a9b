//! In-memory repository for tests and single-node deployments

use crate::repository::FraudRepository;
use crate::types::{
    AlertFilter, AlertInsert, AlertStatus, AlertUpdate, FraudAlert, ReviewUpdate, StatusUpdate,
    TransactionRecord, TransactionStatus, TransferRecord, WalletSnapshot,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Default)]
struct State {
    transactions: HashMap<Uuid, TransactionRecord>,
    transfers: Vec<TransferRecord>,
    wallets: HashMap<Uuid, WalletSnapshot>,
    alerts: Vec<FraudAlert>,
}

/// Repository backed by process memory
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
    fail_reads: AtomicBool,
    fail_alert_writes: AtomicBool,
    fail_status_updates: AtomicBool,
    yield_on_io: AtomicBool,
}

impl InMemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a transaction
    pub fn insert_transaction(&self, record: TransactionRecord) {
        self.state.write().transactions.insert(record.id, record);
    }

    /// Insert a transfer
    pub fn insert_transfer(&self, record: TransferRecord) {
        self.state.write().transfers.push(record);
    }

    /// Insert or replace a wallet
    pub fn set_wallet(&self, wallet: WalletSnapshot) {
        self.state.write().wallets.insert(wallet.user_id, wallet);
    }

    /// Current status of a transaction
    pub fn transaction_status(&self, transaction_id: Uuid) -> Option<TransactionStatus> {
        self.state
            .read()
            .transactions
            .get(&transaction_id)
            .map(|tx| tx.status)
    }

    /// Every stored alert, in creation order
    pub fn alerts(&self) -> Vec<FraudAlert> {
        self.state.read().alerts.clone()
    }

    /// Make every history read fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make alert creation fail
    pub fn set_fail_alert_writes(&self, fail: bool) {
        self.fail_alert_writes.store(fail, Ordering::SeqCst);
    }

    /// Make transaction status updates fail
    pub fn set_fail_status_updates(&self, fail: bool) {
        self.fail_status_updates.store(fail, Ordering::SeqCst);
    }

    /// Yield to the scheduler at the start of every repository call, so
    /// concurrent callers interleave the way they would over a network store
    pub fn set_yield_on_io(&self, enabled: bool) {
        self.yield_on_io.store(enabled, Ordering::SeqCst);
    }

    async fn io_point(&self) {
        if self.yield_on_io.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Storage("history store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FraudRepository for InMemoryRepository {
    async fn recent_transactions(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>> {
        self.io_point().await;
        self.check_reads()?;
        let state = self.state.read();
        let mut records: Vec<_> = state
            .transactions
            .values()
            .filter(|tx| tx.user_id == user_id && tx.created_at >= since)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn recent_transfers(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransferRecord>> {
        self.io_point().await;
        self.check_reads()?;
        let state = self.state.read();
        let mut records: Vec<_> = state
            .transfers
            .iter()
            .filter(|t| t.sender_id == user_id && t.created_at >= since)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn wallet(&self, user_id: Uuid) -> Result<Option<WalletSnapshot>> {
        self.io_point().await;
        self.check_reads()?;
        Ok(self.state.read().wallets.get(&user_id).cloned())
    }

    async fn successful_transactions(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>> {
        self.io_point().await;
        self.check_reads()?;
        let state = self.state.read();
        Ok(state
            .transactions
            .values()
            .filter(|tx| {
                tx.user_id == user_id
                    && tx.created_at >= since
                    && tx.status == TransactionStatus::Completed
            })
            .cloned()
            .collect())
    }

    async fn create_alert(&self, alert: &FraudAlert) -> Result<AlertInsert> {
        self.io_point().await;
        if self.fail_alert_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("alert store unavailable".to_string()));
        }
        let mut state = self.state.write();
        if let Some(existing) = state
            .alerts
            .iter()
            .find(|a| a.transaction_id == alert.transaction_id)
        {
            return Ok(AlertInsert::Existing(existing.clone()));
        }
        state.alerts.push(alert.clone());
        Ok(AlertInsert::Created(alert.clone()))
    }

    async fn update_transaction_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> Result<StatusUpdate> {
        self.io_point().await;
        if self.fail_status_updates.load(Ordering::SeqCst) {
            return Err(Error::Storage("ledger unavailable".to_string()));
        }
        let mut state = self.state.write();
        let Some(tx) = state.transactions.get_mut(&transaction_id) else {
            return Ok(StatusUpdate::NotFound);
        };
        if tx.status.is_terminal() {
            return Ok(StatusUpdate::AlreadyTerminal(tx.status));
        }
        tx.status = status;
        Ok(StatusUpdate::Applied)
    }

    async fn find_alert(&self, alert_id: Uuid) -> Result<Option<FraudAlert>> {
        self.io_point().await;
        Ok(self
            .state
            .read()
            .alerts
            .iter()
            .find(|a| a.id == alert_id)
            .cloned())
    }

    async fn update_alert(&self, alert_id: Uuid, update: AlertUpdate) -> Result<ReviewUpdate> {
        self.io_point().await;
        let mut state = self.state.write();
        let Some(alert) = state.alerts.iter_mut().find(|a| a.id == alert_id) else {
            return Ok(ReviewUpdate::NotFound);
        };
        if alert.status != AlertStatus::Open {
            return Ok(ReviewUpdate::NotOpen(alert.status));
        }
        alert.status = update.status;
        alert.action = Some(update.action);
        alert.reviewed_by = Some(update.reviewed_by);
        alert.reviewed_at = Some(update.reviewed_at);
        Ok(ReviewUpdate::Applied(alert.clone()))
    }

    async fn list_alerts(&self, user_id: Option<Uuid>, limit: usize) -> Result<Vec<FraudAlert>> {
        self.io_point().await;
        let state = self.state.read();
        let mut alerts: Vec<_> = state
            .alerts
            .iter()
            .filter(|a| user_id.map_or(true, |u| a.user_id == u))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn count_alerts(&self, filter: AlertFilter) -> Result<u64> {
        self.io_point().await;
        Ok(self
            .state
            .read()
            .alerts
            .iter()
            .filter(|a| filter.matches(a))
            .count() as u64)
    }
}
