//! Fraud Engine
//!
//! Asynchronous fraud detection for wallet transactions:
//! - Heuristic rules over a bounded window of user activity
//! - Severity aggregation into at most one alert per check
//! - Automatic cancellation of transactions on CRITICAL alerts
//! - Priority job queue with exponential backoff retry
//! - Alert review and statistics
//!
//! # Example
//!
//! ```no_run
//! use fraud_engine::{
//!     CheckRequest, EngineConfig, FraudEngine, InMemoryRepository, InProcessQueue,
//!     JobOptions, LogNotifier, QueueDispatcher, TransactionType,
//! };
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = EngineConfig::default();
//!     let repository = Arc::new(InMemoryRepository::new());
//!     let engine = Arc::new(FraudEngine::new(repository, Arc::new(LogNotifier), &config));
//!
//!     let queue = InProcessQueue::new(10_000);
//!     let workers = queue.start(engine, config.queue.workers);
//!     let dispatcher = QueueDispatcher::new(Arc::new(queue), JobOptions::from(&config.queue));
//!
//!     let request = CheckRequest::new(Uuid::new_v4(), Uuid::new_v4(), TransactionType::Transfer, 5_000);
//!     dispatcher.check_transaction(request).await;
//!
//!     workers.shutdown().await;
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod actions;
pub mod alerts;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod history;
pub mod memory;
pub mod metrics;
pub mod notifier;
pub mod queue;
pub mod repository;
pub mod review;
pub mod rules;
pub mod types;

pub use actions::{ActionExecutor, ActionOutcome};
pub use alerts::{AlertAggregator, AlertDecision};
pub use config::{AlertConfig, EngineConfig, HistoryConfig, QueueConfig, RuleConfig};
pub use dispatcher::QueueDispatcher;
pub use engine::{CheckOutcome, FraudEngine};
pub use error::{Error, Result};
pub use evaluator::{RuleRegistry, TriggeredRule};
pub use history::HistoryLoader;
pub use memory::InMemoryRepository;
pub use notifier::{LogNotifier, NotificationEmitter, NotificationPayload, Notifier};
pub use queue::{FraudCheckJob, InProcessQueue, JobOptions, JobProcessor, JobQueue, RetryPolicy, WorkerPool};
pub use repository::FraudRepository;
pub use review::AlertReviewService;
pub use rules::Rule;
pub use types::*;
