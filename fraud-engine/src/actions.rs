//! Side effects tied to alert severity

use crate::metrics::TRANSACTIONS_BLOCKED_TOTAL;
use crate::repository::FraudRepository;
use crate::types::{CheckRequest, Severity, StatusUpdate, TransactionStatus};
use crate::Error;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What the executor did for one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Severity below CRITICAL; nothing to do
    NoAction,
    /// Transaction was cancelled
    Blocked,
    /// Transaction was already failed or cancelled
    AlreadyTerminal(TransactionStatus),
    /// Transaction was not found on the ledger
    TransactionMissing,
    /// The cancel could not be applied; logged and not retried
    Failed,
}

impl ActionOutcome {
    /// Whether the transaction ends up cancelled
    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            ActionOutcome::Blocked | ActionOutcome::AlreadyTerminal(TransactionStatus::Cancelled)
        )
    }
}

/// Applies the block action for CRITICAL alerts
pub struct ActionExecutor {
    repository: Arc<dyn FraudRepository>,
}

impl ActionExecutor {
    /// Create new action executor
    pub fn new(repository: Arc<dyn FraudRepository>) -> Self {
        Self { repository }
    }

    /// Cancel the transaction if `severity` is CRITICAL. Never fails: errors
    /// are logged and reported as `ActionOutcome::Failed`.
    pub async fn apply(&self, request: &CheckRequest, severity: Severity) -> ActionOutcome {
        if severity != Severity::Critical {
            return ActionOutcome::NoAction;
        }

        match self
            .repository
            .update_transaction_status(request.transaction_id, TransactionStatus::Cancelled)
            .await
        {
            Ok(StatusUpdate::Applied) => {
                TRANSACTIONS_BLOCKED_TOTAL.inc();
                warn!(
                    transaction_id = %request.transaction_id,
                    user_id = %request.user_id,
                    "Transaction blocked due to critical fraud alert"
                );
                ActionOutcome::Blocked
            }
            Ok(StatusUpdate::AlreadyTerminal(status)) => {
                info!(
                    transaction_id = %request.transaction_id,
                    status = status.as_str(),
                    "Transaction already terminal; block skipped"
                );
                ActionOutcome::AlreadyTerminal(status)
            }
            Ok(StatusUpdate::NotFound) => {
                warn!(
                    transaction_id = %request.transaction_id,
                    "Transaction to block not found"
                );
                ActionOutcome::TransactionMissing
            }
            Err(e) => {
                let e = Error::ActionExecution(e.to_string());
                error!(transaction_id = %request.transaction_id, "{}", e);
                ActionOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;
    use crate::types::{TransactionRecord, TransactionType};
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn setup(status: TransactionStatus) -> (Arc<InMemoryRepository>, CheckRequest) {
        let repo = Arc::new(InMemoryRepository::new());
        let request = CheckRequest::new(Uuid::new_v4(), Uuid::new_v4(), TransactionType::Transfer, 1_000);
        repo.insert_transaction(TransactionRecord {
            id: request.transaction_id,
            user_id: request.user_id,
            transaction_type: request.transaction_type,
            amount: request.amount,
            status,
            description: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        });
        (repo, request)
    }

    #[tokio::test]
    async fn test_critical_blocks() {
        let (repo, request) = setup(TransactionStatus::Pending);
        let executor = ActionExecutor::new(repo.clone());

        let outcome = executor.apply(&request, Severity::Critical).await;
        assert_eq!(outcome, ActionOutcome::Blocked);
        assert_eq!(
            repo.transaction_status(request.transaction_id),
            Some(TransactionStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_high_does_not_block() {
        let (repo, request) = setup(TransactionStatus::Pending);
        let executor = ActionExecutor::new(repo.clone());

        assert_eq!(executor.apply(&request, Severity::High).await, ActionOutcome::NoAction);
        assert_eq!(
            repo.transaction_status(request.transaction_id),
            Some(TransactionStatus::Pending)
        );
    }

    #[tokio::test]
    async fn test_block_is_idempotent() {
        let (repo, request) = setup(TransactionStatus::Pending);
        let executor = ActionExecutor::new(repo);

        assert_eq!(executor.apply(&request, Severity::Critical).await, ActionOutcome::Blocked);
        let again = executor.apply(&request, Severity::Critical).await;
        assert_eq!(again, ActionOutcome::AlreadyTerminal(TransactionStatus::Cancelled));
        assert!(again.is_blocked());
    }

    #[tokio::test]
    async fn test_failed_transaction_is_not_blocked() {
        let (repo, request) = setup(TransactionStatus::Failed);
        let executor = ActionExecutor::new(repo.clone());

        let outcome = executor.apply(&request, Severity::Critical).await;
        assert_eq!(outcome, ActionOutcome::AlreadyTerminal(TransactionStatus::Failed));
        assert!(!outcome.is_blocked());
        assert_eq!(
            repo.transaction_status(request.transaction_id),
            Some(TransactionStatus::Failed)
        );
    }

    #[tokio::test]
    async fn test_ledger_failure_is_swallowed() {
        let (repo, request) = setup(TransactionStatus::Pending);
        repo.set_fail_status_updates(true);
        let executor = ActionExecutor::new(repo);

        assert_eq!(executor.apply(&request, Severity::Critical).await, ActionOutcome::Failed);
    }
}
