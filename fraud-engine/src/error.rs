//! Error types for the fraud engine

use thiserror::Error;
use uuid::Uuid;

/// Fraud engine error
#[derive(Debug, Error)]
pub enum Error {
    /// A single rule failed; the rule is counted as not triggered
    #[error("Rule '{rule}' failed: {reason}")]
    RuleEvaluation {
        /// Rule name
        rule: String,
        /// Failure reason
        reason: String,
    },

    /// User history could not be loaded; the check is aborted
    #[error("History load error: {0}")]
    HistoryLoad(String),

    /// Alert could not be persisted
    #[error("Alert persist error: {0}")]
    AlertPersist(String),

    /// Block action could not be applied
    #[error("Action execution error: {0}")]
    ActionExecution(String),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// Check job could not be enqueued
    #[error("Enqueue error: {0}")]
    Enqueue(String),

    /// Alert does not exist
    #[error("Fraud alert not found")]
    AlertNotFound(Uuid),

    /// Alert is not in a state that permits the requested transition
    #[error("Invalid alert transition: {0}")]
    InvalidTransition(String),

    /// Repository failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the requested alert does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::AlertNotFound(_))
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
