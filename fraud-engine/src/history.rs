//! User history loading

use crate::config::HistoryConfig;
use crate::repository::FraudRepository;
use crate::types::{TransactionRecord, UserHistory};
use crate::{Error, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Loads the activity window rules are evaluated against
pub struct HistoryLoader {
    repository: Arc<dyn FraudRepository>,
    config: HistoryConfig,
}

impl HistoryLoader {
    /// Create new history loader
    pub fn new(repository: Arc<dyn FraudRepository>, config: HistoryConfig) -> Self {
        Self { repository, config }
    }

    /// Load a fresh history for the user. The four reads are independent and
    /// run concurrently; any failure aborts the load.
    pub async fn load(&self, user_id: Uuid) -> Result<UserHistory> {
        let as_of = Utc::now();
        let recent_since = as_of - Duration::seconds(self.config.recent_window_secs);
        let average_since = as_of - Duration::days(self.config.average_window_days);

        let (recent_transactions, sent_transfers, wallet, successful) = tokio::try_join!(
            self.repository.recent_transactions(
                user_id,
                recent_since,
                self.config.recent_transaction_limit
            ),
            self.repository.recent_transfers(
                user_id,
                recent_since,
                self.config.recent_transfer_limit
            ),
            self.repository.wallet(user_id),
            self.repository.successful_transactions(user_id, average_since),
        )
        .map_err(|e| Error::HistoryLoad(e.to_string()))?;

        let average_transaction_amount = average_amount(&successful);

        debug!(
            %user_id,
            recent = recent_transactions.len(),
            transfers = sent_transfers.len(),
            average = average_transaction_amount,
            "User history loaded"
        );

        Ok(UserHistory {
            as_of,
            recent_transactions,
            sent_transfers,
            wallet,
            average_transaction_amount,
            is_blacklisted_recipient: false,
            failed_logins: Vec::new(),
        })
    }
}

/// Mean amount, 0 for an empty set
fn average_amount(transactions: &[TransactionRecord]) -> f64 {
    if transactions.is_empty() {
        return 0.0;
    }
    let total: i128 = transactions.iter().map(|tx| tx.amount as i128).sum();
    total as f64 / transactions.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;
    use crate::types::{TransactionStatus, TransactionType, TransferRecord, WalletSnapshot};
    use std::collections::HashMap;

    fn record(user_id: Uuid, status: TransactionStatus, amount: i64, age: Duration) -> TransactionRecord {
        TransactionRecord {
            id: Uuid::new_v4(),
            user_id,
            transaction_type: TransactionType::Payment,
            amount,
            status,
            description: None,
            metadata: HashMap::new(),
            created_at: Utc::now() - age,
        }
    }

    #[test]
    fn test_average_of_empty_set_is_zero() {
        assert_eq!(average_amount(&[]), 0.0);
    }

    #[tokio::test]
    async fn test_load_builds_bounded_windows() {
        let repo = Arc::new(InMemoryRepository::new());
        let user = Uuid::new_v4();

        for _ in 0..12 {
            repo.insert_transaction(record(user, TransactionStatus::Failed, 10, Duration::minutes(5)));
        }
        repo.insert_transaction(record(user, TransactionStatus::Completed, 10_000, Duration::days(2)));
        repo.insert_transaction(record(user, TransactionStatus::Completed, 20_000, Duration::days(10)));
        repo.insert_transaction(record(user, TransactionStatus::Completed, 90_000, Duration::days(40)));

        for _ in 0..7 {
            repo.insert_transfer(TransferRecord {
                id: Uuid::new_v4(),
                sender_id: user,
                recipient_id: Uuid::new_v4(),
                amount: 500,
                created_at: Utc::now() - Duration::minutes(1),
            });
        }
        repo.set_wallet(WalletSnapshot {
            user_id: user,
            balance: 42,
            currency: "NGN".to_string(),
            updated_at: Utc::now(),
        });

        let loader = HistoryLoader::new(repo, HistoryConfig::default());
        let history = loader.load(user).await.unwrap();

        assert_eq!(history.recent_transactions.len(), 10);
        assert_eq!(history.sent_transfers.len(), 5);
        assert_eq!(history.wallet.map(|w| w.balance), Some(42));
        assert_eq!(history.average_transaction_amount, 15_000.0);
        assert!(!history.is_blacklisted_recipient);
        assert!(history.failed_logins.is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_is_history_error() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.set_fail_reads(true);

        let loader = HistoryLoader::new(repo, HistoryConfig::default());
        let err = loader.load(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::HistoryLoad(_)));
    }
}
