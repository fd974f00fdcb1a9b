pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod models;

use fraud_engine::{AlertReviewService, InProcessQueue, QueueDispatcher};
use sqlx::PgPool;
use std::time::Instant;

/// Shared state handed to every request handler
pub struct AppState {
    pub review: AlertReviewService,
    pub dispatcher: QueueDispatcher,
    pub queue: InProcessQueue,

    /// `None` on the in-memory backend
    pub pool: Option<PgPool>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        review: AlertReviewService,
        dispatcher: QueueDispatcher,
        queue: InProcessQueue,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            review,
            dispatcher,
            queue,
            pool,
            started_at: Instant::now(),
        }
    }
}
