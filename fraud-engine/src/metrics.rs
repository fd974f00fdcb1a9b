//! Prometheus metrics for the fraud engine

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Encoder,
    Histogram, IntCounter, TextEncoder,
};

lazy_static! {
    /// Checks processed, by outcome
    pub static ref CHECKS_TOTAL: CounterVec = register_counter_vec!(
        "fraud_checks_total",
        "Total fraud checks processed",
        &["outcome"]
    )
    .unwrap();

    /// Check duration
    pub static ref CHECK_DURATION: Histogram = register_histogram!(
        "fraud_check_duration_seconds",
        "Fraud check duration in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .unwrap();

    /// Rules triggered, by rule and severity
    pub static ref RULES_TRIGGERED_TOTAL: CounterVec = register_counter_vec!(
        "fraud_rules_triggered_total",
        "Total rule triggers",
        &["rule", "severity"]
    )
    .unwrap();

    /// Rules that errored or panicked
    pub static ref RULE_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "fraud_rule_failures_total",
        "Total rule evaluation failures",
        &["rule"]
    )
    .unwrap();

    /// Alerts created, by severity
    pub static ref ALERTS_CREATED_TOTAL: CounterVec = register_counter_vec!(
        "fraud_alerts_created_total",
        "Total fraud alerts created",
        &["severity"]
    )
    .unwrap();

    /// Transactions cancelled by a critical alert
    pub static ref TRANSACTIONS_BLOCKED_TOTAL: IntCounter = register_int_counter!(
        "fraud_transactions_blocked_total",
        "Total transactions blocked"
    )
    .unwrap();

    /// Notifications that could not be delivered
    pub static ref NOTIFICATION_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "fraud_notification_failures_total",
        "Total notification failures"
    )
    .unwrap();

    /// Check jobs that could not be enqueued
    pub static ref ENQUEUE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "fraud_enqueue_failures_total",
        "Total check jobs that failed to enqueue"
    )
    .unwrap();

    /// Job retries scheduled
    pub static ref JOB_RETRIES_TOTAL: IntCounter = register_int_counter!(
        "fraud_job_retries_total",
        "Total check job retries"
    )
    .unwrap();
}

/// Render all registered metrics in Prometheus text format
pub fn render() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
