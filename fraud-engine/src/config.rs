//! Configuration for the fraud engine

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fraud engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rule thresholds
    pub rules: RuleConfig,

    /// History windows
    pub history: HistoryConfig,

    /// Check queue options
    pub queue: QueueConfig,

    /// Alert query options
    pub alerts: AlertConfig,
}

/// Thresholds used by the built-in rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Failed transactions in the history window above which the rule fires
    pub max_failed_transactions: usize,

    /// Multiple of the 30-day average above which an amount is unusual
    pub large_amount_multiplier: f64,

    /// Skip the large-amount rule while the user has no completed
    /// transactions to average. Off by default: any positive amount is
    /// unusual against a zero average.
    pub require_average_baseline: bool,

    /// Window for rapid transfers (seconds)
    pub rapid_transfer_window_secs: i64,

    /// Transfers in the rapid window at which the rule fires
    pub rapid_transfer_count: usize,

    /// Minimum amount (minor units) for a new-recipient transfer to count
    pub new_recipient_min_amount: i64,

    /// Window for location changes (seconds)
    pub location_window_secs: i64,

    /// Window for failed logins (seconds)
    pub failed_login_window_secs: i64,

    /// Failed logins above which the takeover rule may fire
    pub max_failed_logins: usize,

    /// Amount (minor units) above which the takeover rule may fire
    pub takeover_min_amount: i64,

    /// Window for duplicate submissions (seconds)
    pub duplicate_window_secs: i64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            max_failed_transactions: 3,
            large_amount_multiplier: 10.0,
            require_average_baseline: false,
            rapid_transfer_window_secs: 5 * 60,
            rapid_transfer_count: 5,
            new_recipient_min_amount: 100_000,
            location_window_secs: 15 * 60,
            failed_login_window_secs: 60 * 60,
            max_failed_logins: 5,
            takeover_min_amount: 50_000,
            duplicate_window_secs: 2 * 60,
        }
    }
}

/// Upper bound for `queue.initial_backoff_ms` (one hour)
pub const MAX_INITIAL_BACKOFF_MS: u64 = 60 * 60 * 1000;

/// Windows and limits for history loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Recent activity window (seconds)
    pub recent_window_secs: i64,

    /// Max recent transactions
    pub recent_transaction_limit: usize,

    /// Max recent transfers
    pub recent_transfer_limit: usize,

    /// Window for the average amount (days)
    pub average_window_days: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            recent_window_secs: 60 * 60,
            recent_transaction_limit: 10,
            recent_transfer_limit: 5,
            average_window_days: 30,
        }
    }
}

/// Queue options for check jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Job priority (lower runs first)
    pub priority: u8,

    /// Total attempts per job
    pub attempts: u32,

    /// First retry delay (milliseconds), doubled per attempt
    pub initial_backoff_ms: u64,

    /// Worker tasks consuming the queue
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            priority: 1,
            attempts: 3,
            initial_backoff_ms: 2000,
            workers: 4,
        }
    }
}

impl QueueConfig {
    /// Initial backoff as a duration
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

/// Alert query options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Max alerts returned by a listing
    pub list_limit: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { list_limit: 50 }
    }
}

impl EngineConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `FRAUD_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = EngineConfig::default();

        if let Some(workers) = env_parse("FRAUD_QUEUE_WORKERS")? {
            config.queue.workers = workers;
        }

        if let Some(attempts) = env_parse("FRAUD_QUEUE_ATTEMPTS")? {
            config.queue.attempts = attempts;
        }

        if let Some(backoff) = env_parse("FRAUD_QUEUE_BACKOFF_MS")? {
            config.queue.initial_backoff_ms = backoff;
        }

        if let Some(limit) = env_parse("FRAUD_ALERT_LIST_LIMIT")? {
            config.alerts.list_limit = limit;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue.attempts == 0 {
            return Err(Error::Config("queue.attempts must be at least 1".to_string()));
        }
        if self.queue.workers == 0 {
            return Err(Error::Config("queue.workers must be at least 1".to_string()));
        }
        if self.queue.initial_backoff_ms > MAX_INITIAL_BACKOFF_MS {
            return Err(Error::Config(format!(
                "queue.initial_backoff_ms must be at most {}",
                MAX_INITIAL_BACKOFF_MS
            )));
        }
        if self.rules.large_amount_multiplier <= 0.0 {
            return Err(Error::Config(
                "rules.large_amount_multiplier must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("Invalid value for {}: {}", key, raw))),
        Err(_) => Ok(None),
    }
}
