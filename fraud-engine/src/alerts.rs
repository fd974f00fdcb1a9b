//! Reduction of triggered rules to a single alert

use crate::evaluator::TriggeredRule;
use crate::types::{AlertStatus, CheckRequest, FraudAlert, Severity};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Separator between rule descriptions in an alert
pub const DESCRIPTION_SEPARATOR: &str = "; ";

/// Separator between rule names in an alert
pub const RULE_NAME_SEPARATOR: &str = ", ";

/// Outcome of aggregating one check's triggered rules
#[derive(Debug, Clone)]
pub struct AlertDecision {
    /// Alert to persist, if the tier warrants one
    pub alert: Option<FraudAlert>,

    /// Highest severity among all triggered rules
    pub highest_severity: Option<Severity>,
}

/// Turns triggered rules into at most one alert.
///
/// Only CRITICAL and HIGH tiers produce alerts. MEDIUM and LOW triggers are
/// logged and reported through `highest_severity` but never persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertAggregator;

impl AlertAggregator {
    /// Create new aggregator
    pub fn new() -> Self {
        Self
    }

    /// Aggregate the triggered rules of one check
    pub fn aggregate(&self, request: &CheckRequest, triggered: &[TriggeredRule<'_>]) -> AlertDecision {
        let highest_severity = triggered.iter().map(|t| t.severity()).max();

        let tier = [Severity::Critical, Severity::High]
            .into_iter()
            .find(|tier| triggered.iter().any(|t| t.severity() == *tier));

        let Some(tier) = tier else {
            if let Some(severity) = highest_severity {
                info!(
                    transaction_id = %request.transaction_id,
                    %severity,
                    rules = %join_names(triggered),
                    "Rules triggered below alert tier; no alert created"
                );
            }
            return AlertDecision {
                alert: None,
                highest_severity,
            };
        };

        let selected: Vec<_> = triggered
            .iter()
            .filter(|t| t.severity() == tier)
            .copied()
            .collect();

        let alert = FraudAlert {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            transaction_id: request.transaction_id,
            severity: tier,
            status: AlertStatus::Open,
            description: selected
                .iter()
                .map(|t| t.description())
                .collect::<Vec<_>>()
                .join(DESCRIPTION_SEPARATOR),
            rule_names: join_names(&selected),
            created_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            action: None,
        };

        AlertDecision {
            alert: Some(alert),
            highest_severity,
        }
    }
}

fn join_names(triggered: &[TriggeredRule<'_>]) -> String {
    triggered
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(RULE_NAME_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;
    use crate::types::{TransactionType, UserHistory};
    use crate::Result;

    struct Fixed(&'static str, Severity, &'static str);

    impl Rule for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }
        fn severity(&self) -> Severity {
            self.1
        }
        fn description(&self) -> &'static str {
            self.2
        }
        fn evaluate(&self, _: &CheckRequest, _: &UserHistory) -> Result<bool> {
            Ok(true)
        }
    }

    fn request() -> CheckRequest {
        CheckRequest::new(Uuid::new_v4(), Uuid::new_v4(), TransactionType::Transfer, 1_000)
    }

    #[test]
    fn test_critical_tier_wins() {
        let high = Fixed("high_one", Severity::High, "High one");
        let critical = Fixed("critical_one", Severity::Critical, "Critical one");
        let critical_two = Fixed("critical_two", Severity::Critical, "Critical two");
        let triggered = vec![
            TriggeredRule { rule: &high },
            TriggeredRule { rule: &critical },
            TriggeredRule { rule: &critical_two },
        ];

        let req = request();
        let decision = AlertAggregator::new().aggregate(&req, &triggered);
        let alert = decision.alert.unwrap();

        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.status, AlertStatus::Open);
        assert_eq!(alert.rule_names, "critical_one, critical_two");
        assert_eq!(alert.description, "Critical one; Critical two");
        assert_eq!(alert.transaction_id, req.transaction_id);
        assert_eq!(decision.highest_severity, Some(Severity::Critical));
    }

    #[test]
    fn test_high_tier_without_critical() {
        let medium = Fixed("medium_one", Severity::Medium, "Medium one");
        let high = Fixed("high_one", Severity::High, "High one");
        let triggered = vec![TriggeredRule { rule: &medium }, TriggeredRule { rule: &high }];

        let decision = AlertAggregator::new().aggregate(&request(), &triggered);
        let alert = decision.alert.unwrap();
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.rule_names, "high_one");
    }

    #[test]
    fn test_medium_and_low_never_alert() {
        let medium = Fixed("medium_one", Severity::Medium, "Medium one");
        let low = Fixed("low_one", Severity::Low, "Low one");
        let triggered = vec![TriggeredRule { rule: &low }, TriggeredRule { rule: &medium }];

        let decision = AlertAggregator::new().aggregate(&request(), &triggered);
        assert!(decision.alert.is_none());
        assert_eq!(decision.highest_severity, Some(Severity::Medium));
    }

    #[test]
    fn test_order_does_not_change_tier() {
        let high = Fixed("high_one", Severity::High, "High one");
        let critical = Fixed("critical_one", Severity::Critical, "Critical one");
        let forward = vec![TriggeredRule { rule: &high }, TriggeredRule { rule: &critical }];
        let backward = vec![TriggeredRule { rule: &critical }, TriggeredRule { rule: &high }];

        let aggregator = AlertAggregator::new();
        let a = aggregator.aggregate(&request(), &forward).alert.unwrap();
        let b = aggregator.aggregate(&request(), &backward).alert.unwrap();
        assert_eq!(a.severity, b.severity);
        assert_eq!(a.rule_names, b.rule_names);
    }

    #[test]
    fn test_nothing_triggered() {
        let decision = AlertAggregator::new().aggregate(&request(), &[]);
        assert!(decision.alert.is_none());
        assert!(decision.highest_severity.is_none());
    }
}
