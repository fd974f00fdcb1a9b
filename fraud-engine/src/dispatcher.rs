//! Fire-and-forget submission of fraud checks

use crate::metrics::ENQUEUE_FAILURES_TOTAL;
use crate::queue::{FraudCheckJob, JobOptions, JobQueue};
use crate::types::CheckRequest;
use std::sync::Arc;
use tracing::{error, info};

/// Decouples "check requested" from "check performed"
pub struct QueueDispatcher {
    queue: Arc<dyn JobQueue>,
    options: JobOptions,
}

impl QueueDispatcher {
    /// Create new dispatcher
    pub fn new(queue: Arc<dyn JobQueue>, options: JobOptions) -> Self {
        Self { queue, options }
    }

    /// Options attached to every job
    pub fn options(&self) -> JobOptions {
        self.options
    }

    /// Enqueue a check for the transaction. Never fails: enqueue errors are
    /// logged so the caller's transaction flow is unaffected.
    pub async fn check_transaction(&self, request: CheckRequest) {
        let transaction_id = request.transaction_id;
        let user_id = request.user_id;
        let job = FraudCheckJob::new(request);
        let job_id = job.id;

        match self.queue.enqueue(job, self.options).await {
            Ok(()) => {
                info!(%job_id, %transaction_id, %user_id, "Fraud check queued");
            }
            Err(e) => {
                ENQUEUE_FAILURES_TOTAL.inc();
                error!(%transaction_id, %user_id, "Failed to queue fraud check: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionType;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct Recording {
        jobs: Mutex<Vec<(FraudCheckJob, JobOptions)>>,
    }

    #[async_trait]
    impl JobQueue for Recording {
        async fn enqueue(&self, job: FraudCheckJob, options: JobOptions) -> Result<()> {
            self.jobs.lock().push((job, options));
            Ok(())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl JobQueue for Unavailable {
        async fn enqueue(&self, _: FraudCheckJob, _: JobOptions) -> Result<()> {
            Err(Error::Enqueue("broker unreachable".to_string()))
        }
    }

    fn request() -> CheckRequest {
        CheckRequest::new(Uuid::new_v4(), Uuid::new_v4(), TransactionType::Withdrawal, 7_500)
    }

    #[tokio::test]
    async fn test_enqueues_with_priority_and_retry() {
        let queue = Arc::new(Recording::default());
        let dispatcher = QueueDispatcher::new(queue.clone(), JobOptions::default());
        let req = request();

        dispatcher.check_transaction(req.clone()).await;

        let jobs = queue.jobs.lock();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0.request, req);
        assert_eq!(jobs[0].0.attempts_made, 0);
        assert_eq!(jobs[0].1.priority, 1);
        assert_eq!(jobs[0].1.retry.attempts, 3);
    }

    #[tokio::test]
    async fn test_enqueue_failure_is_swallowed() {
        let dispatcher = QueueDispatcher::new(Arc::new(Unavailable), JobOptions::default());
        dispatcher.check_transaction(request()).await;
    }
}
