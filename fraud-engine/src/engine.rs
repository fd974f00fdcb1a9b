//! Fraud check pipeline
//!
//! ```text
//! CheckRequest
//!      │
//!      ▼
//! HistoryLoader ──► error? abort, no alert, no block (fail-open)
//!      │
//!      ▼
//! RuleRegistry  ──► failing rules count as not triggered
//!      │
//!      ▼
//! AlertAggregator ──► below HIGH? log only
//!      │
//!      ▼
//! persist alert ──► error? abort before blocking
//!      │
//!      ▼
//! ActionExecutor (CRITICAL: cancel transaction)
//!      │
//!      ▼
//! NotificationEmitter (best effort)
//! ```

use crate::actions::ActionExecutor;
use crate::alerts::AlertAggregator;
use crate::config::EngineConfig;
use crate::evaluator::RuleRegistry;
use crate::history::HistoryLoader;
use crate::metrics::{ALERTS_CREATED_TOTAL, CHECKS_TOTAL, CHECK_DURATION};
use crate::notifier::{NotificationEmitter, Notifier};
use crate::queue::{FraudCheckJob, JobProcessor};
use crate::repository::FraudRepository;
use crate::types::{AlertInsert, CheckRequest, FraudAlert, Severity};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of one fraud check
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub transaction_id: Uuid,

    /// Names of every triggered rule, in evaluation order
    pub triggered_rules: Vec<String>,

    /// Highest severity among triggered rules
    pub highest_severity: Option<Severity>,

    /// Alert created (or reused) for this transaction
    pub alert: Option<FraudAlert>,

    /// Whether the alert already existed from an earlier delivery of the same check
    pub duplicate: bool,

    /// Whether the transaction ended up cancelled
    pub blocked: bool,
}

/// Evaluates transactions end to end
pub struct FraudEngine {
    repository: Arc<dyn FraudRepository>,
    history: HistoryLoader,
    registry: Arc<RuleRegistry>,
    aggregator: AlertAggregator,
    actions: ActionExecutor,
    notifications: NotificationEmitter,
}

impl FraudEngine {
    /// Engine with the built-in rules
    pub fn new(
        repository: Arc<dyn FraudRepository>,
        notifier: Arc<dyn Notifier>,
        config: &EngineConfig,
    ) -> Self {
        let registry = Arc::new(RuleRegistry::with_default_rules(&config.rules));
        Self::with_registry(repository, notifier, registry, config)
    }

    /// Engine with a custom rule registry
    pub fn with_registry(
        repository: Arc<dyn FraudRepository>,
        notifier: Arc<dyn Notifier>,
        registry: Arc<RuleRegistry>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            history: HistoryLoader::new(repository.clone(), config.history.clone()),
            actions: ActionExecutor::new(repository.clone()),
            notifications: NotificationEmitter::new(notifier),
            aggregator: AlertAggregator::new(),
            registry,
            repository,
        }
    }

    /// Rule registry in use
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Run one check. History and alert persistence failures abort the check
    /// without blocking; block and notification failures are logged only.
    pub async fn perform_fraud_check(&self, request: &CheckRequest) -> Result<CheckOutcome> {
        let start = Instant::now();
        let result = self.run_check(request).await;
        CHECK_DURATION.observe(start.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok(o) if o.blocked => "blocked",
            Ok(o) if o.alert.is_some() => "alerted",
            Ok(_) => "clean",
            Err(Error::HistoryLoad(_)) => "history_error",
            Err(_) => "error",
        };
        CHECKS_TOTAL.with_label_values(&[outcome]).inc();

        if let Err(e) = &result {
            error!(
                transaction_id = %request.transaction_id,
                user_id = %request.user_id,
                "Fraud check aborted: {}", e
            );
        }
        result
    }

    async fn run_check(&self, request: &CheckRequest) -> Result<CheckOutcome> {
        let history = self.history.load(request.user_id).await?;

        let triggered = self.registry.evaluate(request, &history);
        for rule in &triggered {
            warn!(
                transaction_id = %request.transaction_id,
                user_id = %request.user_id,
                rule = rule.name(),
                severity = %rule.severity(),
                "Fraud rule triggered"
            );
        }

        let decision = self.aggregator.aggregate(request, &triggered);
        let triggered_rules = triggered.iter().map(|t| t.name().to_string()).collect();

        let Some(candidate) = decision.alert else {
            return Ok(CheckOutcome {
                transaction_id: request.transaction_id,
                triggered_rules,
                highest_severity: decision.highest_severity,
                alert: None,
                duplicate: false,
                blocked: false,
            });
        };

        let (alert, duplicate) = self.persist_alert(candidate).await?;

        let action = self.actions.apply(request, alert.severity).await;

        if !duplicate {
            self.notifications
                .notify(request.user_id, alert.id, alert.severity)
                .await;
        }

        Ok(CheckOutcome {
            transaction_id: request.transaction_id,
            triggered_rules,
            highest_severity: decision.highest_severity,
            alert: Some(alert),
            duplicate,
            blocked: action.is_blocked(),
        })
    }

    /// Store the alert unless one already exists for the transaction
    async fn persist_alert(&self, candidate: FraudAlert) -> Result<(FraudAlert, bool)> {
        let stored = self
            .repository
            .create_alert(&candidate)
            .await
            .map_err(|e| Error::AlertPersist(e.to_string()))?;

        let alert = match stored {
            AlertInsert::Existing(existing) => {
                info!(
                    alert_id = %existing.id,
                    transaction_id = %existing.transaction_id,
                    "Alert already exists for transaction; reusing"
                );
                return Ok((existing, true));
            }
            AlertInsert::Created(alert) => alert,
        };

        ALERTS_CREATED_TOTAL
            .with_label_values(&[alert.severity.as_str()])
            .inc();
        info!(
            alert_id = %alert.id,
            user_id = %alert.user_id,
            severity = %alert.severity,
            rules = %alert.rule_names,
            "Fraud alert created"
        );

        Ok((alert, false))
    }
}

#[async_trait]
impl JobProcessor for FraudEngine {
    async fn process(&self, job: &FraudCheckJob) -> Result<()> {
        self.perform_fraud_check(&job.request).await.map(|outcome| {
            if outcome.blocked {
                info!(job_id = %job.id, "Fraud check finished; transaction blocked");
            }
        })
    }
}
