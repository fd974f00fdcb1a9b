//! Rule registry and evaluation

use crate::config::RuleConfig;
use crate::metrics::{RULES_TRIGGERED_TOTAL, RULE_FAILURES_TOTAL};
use crate::rules::{default_rules, Rule};
use crate::types::{CheckRequest, Severity, UserHistory};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// A rule that fired during one check
#[derive(Clone, Copy)]
pub struct TriggeredRule<'a> {
    /// The rule that fired
    pub rule: &'a dyn Rule,
}

impl<'a> TriggeredRule<'a> {
    /// Rule name
    pub fn name(&self) -> &'static str {
        self.rule.name()
    }

    /// Rule severity
    pub fn severity(&self) -> Severity {
        self.rule.severity()
    }

    /// Rule description
    pub fn description(&self) -> &'static str {
        self.rule.description()
    }
}

impl std::fmt::Debug for TriggeredRule<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggeredRule")
            .field("name", &self.name())
            .field("severity", &self.severity())
            .finish()
    }
}

/// Immutable set of rules, fixed at construction
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    /// Registry over the given rules, evaluated in this order
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Registry with the built-in rules
    pub fn with_default_rules(config: &RuleConfig) -> Self {
        Self::new(default_rules(config))
    }

    /// Number of registered rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are registered
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registered rule names, in order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule. A rule that errors or panics counts as not triggered
    /// and never stops the remaining rules.
    pub fn evaluate<'a>(
        &'a self,
        request: &CheckRequest,
        history: &UserHistory,
    ) -> Vec<TriggeredRule<'a>> {
        let mut triggered = Vec::new();

        for rule in &self.rules {
            let outcome = catch_unwind(AssertUnwindSafe(|| rule.evaluate(request, history)));

            match outcome {
                Ok(Ok(true)) => {
                    RULES_TRIGGERED_TOTAL
                        .with_label_values(&[rule.name(), rule.severity().as_str()])
                        .inc();
                    triggered.push(TriggeredRule { rule: rule.as_ref() });
                }
                Ok(Ok(false)) => {
                    debug!(rule = rule.name(), "Rule not triggered");
                }
                Ok(Err(e)) => {
                    RULE_FAILURES_TOTAL.with_label_values(&[rule.name()]).inc();
                    warn!(
                        rule = rule.name(),
                        transaction_id = %request.transaction_id,
                        "Rule evaluation failed: {}", e
                    );
                }
                Err(_) => {
                    RULE_FAILURES_TOTAL.with_label_values(&[rule.name()]).inc();
                    warn!(
                        rule = rule.name(),
                        transaction_id = %request.transaction_id,
                        "Rule evaluation panicked"
                    );
                }
            }
        }

        triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionType;
    use crate::{Error, Result};
    use chrono::Utc;
    use uuid::Uuid;

    struct Always(&'static str, Severity);

    impl Rule for Always {
        fn name(&self) -> &'static str {
            self.0
        }
        fn severity(&self) -> Severity {
            self.1
        }
        fn description(&self) -> &'static str {
            "always"
        }
        fn evaluate(&self, _: &CheckRequest, _: &UserHistory) -> Result<bool> {
            Ok(true)
        }
    }

    struct Failing;

    impl Rule for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn severity(&self) -> Severity {
            Severity::Critical
        }
        fn description(&self) -> &'static str {
            "fails"
        }
        fn evaluate(&self, _: &CheckRequest, _: &UserHistory) -> Result<bool> {
            Err(Error::RuleEvaluation {
                rule: "failing".to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    struct Panicking;

    impl Rule for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn severity(&self) -> Severity {
            Severity::Critical
        }
        fn description(&self) -> &'static str {
            "panics"
        }
        fn evaluate(&self, _: &CheckRequest, _: &UserHistory) -> Result<bool> {
            panic!("rule bug")
        }
    }

    struct Never;

    impl Rule for Never {
        fn name(&self) -> &'static str {
            "never"
        }
        fn severity(&self) -> Severity {
            Severity::Critical
        }
        fn description(&self) -> &'static str {
            "never"
        }
        fn evaluate(&self, _: &CheckRequest, _: &UserHistory) -> Result<bool> {
            Ok(false)
        }
    }

    fn names(registry: &RuleRegistry) -> Vec<&'static str> {
        let request = CheckRequest::new(Uuid::new_v4(), Uuid::new_v4(), TransactionType::Topup, 1);
        let history = UserHistory::empty(Utc::now());
        registry
            .evaluate(&request, &history)
            .iter()
            .map(|t| t.name())
            .collect()
    }

    #[test]
    fn test_failing_rule_is_isolated() {
        let with_failures = RuleRegistry::new(vec![
            Box::new(Always("first", Severity::High)),
            Box::new(Failing),
            Box::new(Panicking),
            Box::new(Always("last", Severity::Medium)),
        ]);
        let with_no_ops = RuleRegistry::new(vec![
            Box::new(Always("first", Severity::High)),
            Box::new(Never),
            Box::new(Never),
            Box::new(Always("last", Severity::Medium)),
        ]);

        assert_eq!(names(&with_failures), vec!["first", "last"]);
        assert_eq!(names(&with_failures), names(&with_no_ops));
    }

    #[test]
    fn test_default_registry_on_empty_history() {
        let registry = RuleRegistry::with_default_rules(&RuleConfig::default());
        assert_eq!(registry.len(), 8);
        // Any positive amount is large against a zero average
        assert_eq!(names(&registry), vec!["unusually_large_transaction"]);
    }
}
