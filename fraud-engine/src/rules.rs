//! Fraud detection rules
//!
//! A rule is a pure predicate over a check request and the user's recent
//! history. Rules never mutate either input. Time windows are measured from
//! `UserHistory::as_of`, so the same inputs always give the same answer.

use crate::config::RuleConfig;
use crate::types::{CheckRequest, Severity, TransactionStatus, TransactionType, UserHistory};
use crate::{Error, Result};
use chrono::Duration;
use uuid::Uuid;

/// Named, severity-tagged predicate
pub trait Rule: Send + Sync {
    /// Unique rule name
    fn name(&self) -> &'static str;

    /// Severity reported when the rule triggers
    fn severity(&self) -> Severity;

    /// Human-readable description used in alerts
    fn description(&self) -> &'static str;

    /// Whether the rule triggers for this request
    fn evaluate(&self, request: &CheckRequest, history: &UserHistory) -> Result<bool>;
}

/// Built-in rule set, in registration order
pub fn default_rules(config: &RuleConfig) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(MultipleFailedTransactions {
            max_failed: config.max_failed_transactions,
        }),
        Box::new(UnusuallyLargeTransaction {
            multiplier: config.large_amount_multiplier,
            require_baseline: config.require_average_baseline,
        }),
        Box::new(RapidConsecutiveTransfers {
            window: Duration::seconds(config.rapid_transfer_window_secs),
            count: config.rapid_transfer_count,
        }),
        Box::new(NewRecipientLargeAmount {
            min_amount: config.new_recipient_min_amount,
        }),
        Box::new(LocationVelocityCheck {
            window: Duration::seconds(config.location_window_secs),
        }),
        Box::new(AccountTakeoverAttempt {
            window: Duration::seconds(config.failed_login_window_secs),
            max_failed_logins: config.max_failed_logins,
            min_amount: config.takeover_min_amount,
        }),
        Box::new(DuplicateTransaction {
            window: Duration::seconds(config.duplicate_window_secs),
        }),
        Box::new(BlacklistRecipient),
    ]
}

/// More than `max_failed` failed transactions in the recent window
pub struct MultipleFailedTransactions {
    pub max_failed: usize,
}

impl Rule for MultipleFailedTransactions {
    fn name(&self) -> &'static str {
        "multiple_failed_transactions"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &'static str {
        "Multiple failed transactions in the last hour"
    }

    fn evaluate(&self, _request: &CheckRequest, history: &UserHistory) -> Result<bool> {
        let failed = history
            .recent_transactions
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Failed)
            .count();
        Ok(failed > self.max_failed)
    }
}

/// Amount above `multiplier` times the 30-day average
pub struct UnusuallyLargeTransaction {
    pub multiplier: f64,
    /// Never fire while the average is zero
    pub require_baseline: bool,
}

impl Rule for UnusuallyLargeTransaction {
    fn name(&self) -> &'static str {
        "unusually_large_transaction"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn description(&self) -> &'static str {
        "Transaction amount is unusually large compared to user's average"
    }

    fn evaluate(&self, request: &CheckRequest, history: &UserHistory) -> Result<bool> {
        let average = history.average_transaction_amount;
        if self.require_baseline && average <= 0.0 {
            return Ok(false);
        }
        Ok(request.amount as f64 > average * self.multiplier)
    }
}

/// At least `count` outgoing transfers inside `window`
pub struct RapidConsecutiveTransfers {
    pub window: Duration,
    pub count: usize,
}

impl Rule for RapidConsecutiveTransfers {
    fn name(&self) -> &'static str {
        "rapid_consecutive_transfers"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn description(&self) -> &'static str {
        "Multiple transfers in rapid succession"
    }

    fn evaluate(&self, _request: &CheckRequest, history: &UserHistory) -> Result<bool> {
        let since = history.as_of - self.window;
        let recent = history
            .sent_transfers
            .iter()
            .filter(|t| t.created_at >= since)
            .count();
        Ok(recent >= self.count)
    }
}

/// Large transfer to a recipient the user has not sent to recently
pub struct NewRecipientLargeAmount {
    pub min_amount: i64,
}

impl Rule for NewRecipientLargeAmount {
    fn name(&self) -> &'static str {
        "new_recipient_large_amount"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn description(&self) -> &'static str {
        "Large transfer to a new recipient"
    }

    fn evaluate(&self, request: &CheckRequest, history: &UserHistory) -> Result<bool> {
        if request.transaction_type != TransactionType::Transfer || request.amount < self.min_amount {
            return Ok(false);
        }

        let Some(raw) = request.recipient_id() else {
            return Ok(false);
        };
        let recipient = raw
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| Error::RuleEvaluation {
                rule: self.name().to_string(),
                reason: format!("recipientId is not a valid id: {}", raw),
            })?;

        let known = history
            .sent_transfers
            .iter()
            .any(|t| t.recipient_id == recipient);
        Ok(!known)
    }
}

/// Location changed since the previous transaction within `window`
pub struct LocationVelocityCheck {
    pub window: Duration,
}

impl Rule for LocationVelocityCheck {
    fn name(&self) -> &'static str {
        "location_velocity_check"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "Transaction from a different location within a short time"
    }

    fn evaluate(&self, request: &CheckRequest, history: &UserHistory) -> Result<bool> {
        let Some(location) = request.location() else {
            return Ok(false);
        };

        let previous = history
            .recent_transactions
            .iter()
            .find(|tx| tx.id != request.transaction_id);
        let Some(previous) = previous else {
            return Ok(false);
        };
        let Some(previous_location) = previous.location() else {
            return Ok(false);
        };

        let elapsed = history.as_of - previous.created_at;
        Ok(previous_location != location && elapsed < self.window)
    }
}

/// Many failed logins followed by a large transaction
pub struct AccountTakeoverAttempt {
    pub window: Duration,
    pub max_failed_logins: usize,
    pub min_amount: i64,
}

impl Rule for AccountTakeoverAttempt {
    fn name(&self) -> &'static str {
        "account_takeover_attempt"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "Possible account takeover: failed logins followed by a large transaction"
    }

    fn evaluate(&self, request: &CheckRequest, history: &UserHistory) -> Result<bool> {
        let since = history.as_of - self.window;
        let failed = history
            .failed_logins
            .iter()
            .filter(|l| l.attempted_at >= since)
            .count();
        Ok(failed > self.max_failed_logins && request.amount > self.min_amount)
    }
}

/// Same amount and description submitted again within `window`
pub struct DuplicateTransaction {
    pub window: Duration,
}

impl Rule for DuplicateTransaction {
    fn name(&self) -> &'static str {
        "duplicate_transaction"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &'static str {
        "Duplicate transaction detected"
    }

    fn evaluate(&self, request: &CheckRequest, history: &UserHistory) -> Result<bool> {
        let since = history.as_of - self.window;
        let duplicates = history
            .recent_transactions
            .iter()
            .filter(|tx| {
                tx.id != request.transaction_id
                    && tx.created_at >= since
                    && tx.amount == request.amount
                    && tx.description == request.description
            })
            .count();
        Ok(duplicates > 0)
    }
}

/// Recipient is on the blacklist
pub struct BlacklistRecipient;

impl Rule for BlacklistRecipient {
    fn name(&self) -> &'static str {
        "blacklist_recipient"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "Recipient is blacklisted"
    }

    fn evaluate(&self, _request: &CheckRequest, history: &UserHistory) -> Result<bool> {
        Ok(history.is_blacklisted_recipient)
    }
}
