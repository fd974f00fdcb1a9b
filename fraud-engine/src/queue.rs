//! Check job queue with priority ordering and retry

use crate::config::QueueConfig;
use crate::metrics::JOB_RETRIES_TOTAL;
use crate::types::CheckRequest;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A queued fraud check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudCheckJob {
    /// Job id
    pub id: Uuid,

    /// Request to check
    pub request: CheckRequest,

    /// Attempts made so far
    pub attempts_made: u32,
}

impl FraudCheckJob {
    /// New job that has not run yet
    pub fn new(request: CheckRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            attempts_made: 0,
        }
    }
}

/// Retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay after the given number of failed attempts (1-based), saturating at `Duration::MAX`
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        self.initial_backoff
            .checked_mul(2u32.pow(exponent))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(2000),
        }
    }
}

/// Options attached to each enqueued job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    /// Lower runs first
    pub priority: u8,

    /// Retry policy
    pub retry: RetryPolicy,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            priority: 1,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&QueueConfig> for JobOptions {
    fn from(config: &QueueConfig) -> Self {
        Self {
            priority: config.priority,
            retry: RetryPolicy {
                attempts: config.attempts,
                initial_backoff: config.initial_backoff(),
            },
        }
    }
}

/// Queue that accepts check jobs
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a job
    async fn enqueue(&self, job: FraudCheckJob, options: JobOptions) -> Result<()>;
}

/// Worker-side handler for one job
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Process a single job; an error schedules a retry while attempts remain
    async fn process(&self, job: &FraudCheckJob) -> Result<()>;
}

struct QueuedJob {
    priority: u8,
    seq: u64,
    job: FraudCheckJob,
    options: JobOptions,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // BinaryHeap is a max-heap: lowest priority number, then oldest, pops first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Shared {
    heap: Mutex<BinaryHeap<QueuedJob>>,
    notify: Notify,
    seq: AtomicU64,
    closed: AtomicBool,
    /// Retries sleeping out their backoff
    pending_retries: AtomicUsize,
    capacity: usize,
}

impl Shared {
    fn push(&self, job: FraudCheckJob, options: JobOptions) -> Result<()> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            return Err(Error::Enqueue("queue is closed".to_string()));
        }
        self.insert(job, options)
    }

    /// Push without the closed check; retries are still drained after shutdown
    fn insert(&self, job: FraudCheckJob, options: JobOptions) -> Result<()> {
        {
            let mut heap = self.heap.lock();
            if heap.len() >= self.capacity {
                return Err(Error::Enqueue(format!(
                    "queue is full ({} jobs)",
                    self.capacity
                )));
            }
            heap.push(QueuedJob {
                priority: options.priority,
                seq: self.seq.fetch_add(1, AtomicOrdering::SeqCst),
                job,
                options,
            });
        }
        self.notify.notify_one();
        Ok(())
    }

    fn pop(&self) -> Option<QueuedJob> {
        self.heap.lock().pop()
    }

    /// Closed with no retry left that could refill the heap
    fn is_finished(&self) -> bool {
        self.closed.load(AtomicOrdering::SeqCst)
            && self.pending_retries.load(AtomicOrdering::SeqCst) == 0
    }
}

/// In-process priority queue consumed by a pool of tokio workers
#[derive(Clone)]
pub struct InProcessQueue {
    shared: Arc<Shared>,
}

impl InProcessQueue {
    /// Create a queue holding at most `capacity` waiting jobs
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                heap: Mutex::new(BinaryHeap::new()),
                notify: Notify::new(),
                seq: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                pending_retries: AtomicUsize::new(0),
                capacity,
            }),
        }
    }

    /// Jobs waiting to run
    pub fn len(&self) -> usize {
        self.shared.heap.lock().len()
    }

    /// Whether no jobs are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn `workers` tasks that process jobs until the queue is closed and drained
    pub fn start<P>(&self, processor: Arc<P>, workers: usize) -> WorkerPool
    where
        P: JobProcessor + 'static,
    {
        info!("Starting {} fraud check workers", workers);

        let handles = (0..workers)
            .map(|worker_id| {
                let shared = self.shared.clone();
                let processor = processor.clone();
                tokio::spawn(worker_loop(worker_id, shared, processor))
            })
            .collect();

        WorkerPool {
            shared: self.shared.clone(),
            handles,
        }
    }
}

#[async_trait]
impl JobQueue for InProcessQueue {
    async fn enqueue(&self, job: FraudCheckJob, options: JobOptions) -> Result<()> {
        debug!(job_id = %job.id, priority = options.priority, "Enqueueing fraud check");
        self.shared.push(job, options)
    }
}

/// Running workers of an `InProcessQueue`
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Stop accepting jobs and wait for workers to drain the queue, including
    /// retries still waiting out their backoff
    pub async fn shutdown(self) {
        self.shared.closed.store(true, AtomicOrdering::SeqCst);
        self.shared.notify.notify_waiters();

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Fraud check worker terminated abnormally: {}", e);
            }
        }
        info!("Fraud check workers stopped");
    }
}

async fn worker_loop<P>(worker_id: usize, shared: Arc<Shared>, processor: Arc<P>)
where
    P: JobProcessor + 'static,
{
    loop {
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        // Read before popping: a retry lands in the heap before it stops counting as pending
        let finished = shared.is_finished();

        if let Some(queued) = shared.pop() {
            run_job(worker_id, &shared, processor.as_ref(), queued).await;
            continue;
        }

        if finished {
            break;
        }

        notified.await;
    }

    debug!(worker_id, "Fraud check worker exiting");
}

async fn run_job<P>(worker_id: usize, shared: &Arc<Shared>, processor: &P, mut queued: QueuedJob)
where
    P: JobProcessor + ?Sized,
{
    queued.job.attempts_made += 1;
    let attempt = queued.job.attempts_made;

    let Err(e) = processor.process(&queued.job).await else {
        return;
    };

    let policy = queued.options.retry;
    if attempt >= policy.attempts {
        error!(
            worker_id,
            job_id = %queued.job.id,
            transaction_id = %queued.job.request.transaction_id,
            "Fraud check failed after {} attempts: {}", attempt, e
        );
        return;
    }

    let delay = policy.delay_after(attempt);
    JOB_RETRIES_TOTAL.inc();
    warn!(
        worker_id,
        job_id = %queued.job.id,
        "Fraud check failed (attempt {}), retrying in {:?}: {}", attempt, delay, e
    );

    shared.pending_retries.fetch_add(1, AtomicOrdering::SeqCst);
    let shared = shared.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let job_id = queued.job.id;
        if let Err(e) = shared.insert(queued.job, queued.options) {
            error!(%job_id, "Could not requeue fraud check: {}", e);
        }
        shared.pending_retries.fetch_sub(1, AtomicOrdering::SeqCst);
        shared.notify.notify_waiters();
    });
}
