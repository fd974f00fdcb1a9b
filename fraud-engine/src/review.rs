//! Alert queries and review workflow

use crate::config::AlertConfig;
use crate::repository::FraudRepository;
use crate::types::{
    AlertFilter, AlertStatistics, AlertStatus, AlertUpdate, FraudAlert, ReviewUpdate, Severity,
};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Read and administrative access to alerts
pub struct AlertReviewService {
    repository: Arc<dyn FraudRepository>,
    config: AlertConfig,
}

impl AlertReviewService {
    /// Create new review service
    pub fn new(repository: Arc<dyn FraudRepository>, config: AlertConfig) -> Self {
        Self { repository, config }
    }

    /// Newest alerts first, capped at the configured limit
    pub async fn list_alerts(&self, user_id: Option<Uuid>) -> Result<Vec<FraudAlert>> {
        self.repository
            .list_alerts(user_id, self.config.list_limit)
            .await
    }

    /// Alert by id
    pub async fn get_alert(&self, alert_id: Uuid) -> Result<FraudAlert> {
        self.repository
            .find_alert(alert_id)
            .await?
            .ok_or(Error::AlertNotFound(alert_id))
    }

    /// Counts by status and severity
    pub async fn statistics(&self) -> Result<AlertStatistics> {
        let (total, open, resolved, dismissed, critical) = tokio::try_join!(
            self.repository.count_alerts(AlertFilter::all()),
            self.repository.count_alerts(AlertFilter::status(AlertStatus::Open)),
            self.repository.count_alerts(AlertFilter::status(AlertStatus::Resolved)),
            self.repository.count_alerts(AlertFilter::status(AlertStatus::Dismissed)),
            self.repository.count_alerts(AlertFilter::severity(Severity::Critical)),
        )?;

        let resolution_rate = if total == 0 {
            0.0
        } else {
            resolved as f64 / total as f64 * 100.0
        };

        Ok(AlertStatistics {
            total,
            open,
            resolved,
            dismissed,
            critical,
            resolution_rate,
        })
    }

    /// Mark an open alert RESOLVED
    pub async fn resolve(&self, alert_id: Uuid, action: &str, resolved_by: &str) -> Result<FraudAlert> {
        self.review(alert_id, AlertStatus::Resolved, action, resolved_by)
            .await
    }

    /// Mark an open alert DISMISSED
    pub async fn dismiss(&self, alert_id: Uuid, action: &str, dismissed_by: &str) -> Result<FraudAlert> {
        self.review(alert_id, AlertStatus::Dismissed, action, dismissed_by)
            .await
    }

    async fn review(
        &self,
        alert_id: Uuid,
        status: AlertStatus,
        action: &str,
        reviewer: &str,
    ) -> Result<FraudAlert> {
        if status == AlertStatus::Open {
            return Err(Error::InvalidTransition(
                "alerts cannot be reopened".to_string(),
            ));
        }

        let update = AlertUpdate {
            status,
            action: action.to_string(),
            reviewed_by: reviewer.to_string(),
            reviewed_at: Utc::now(),
        };

        let alert = match self.repository.update_alert(alert_id, update).await? {
            ReviewUpdate::Applied(alert) => alert,
            ReviewUpdate::NotOpen(current) => {
                return Err(Error::InvalidTransition(format!(
                    "alert {} is already {}",
                    alert_id,
                    current.as_str()
                )))
            }
            ReviewUpdate::NotFound => return Err(Error::AlertNotFound(alert_id)),
        };

        info!(
            %alert_id,
            status = alert.status.as_str(),
            reviewer,
            "Fraud alert reviewed"
        );
        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;
    use chrono::Duration;

    fn alert(severity: Severity, age_minutes: i64) -> FraudAlert {
        FraudAlert {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            severity,
            status: AlertStatus::Open,
            description: "Recipient is blacklisted".to_string(),
            rule_names: "blacklist_recipient".to_string(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
            reviewed_at: None,
            reviewed_by: None,
            action: None,
        }
    }

    async fn service_with(alerts: Vec<FraudAlert>) -> (AlertReviewService, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        for a in &alerts {
            repo.create_alert(a).await.unwrap();
        }
        (AlertReviewService::new(repo.clone(), AlertConfig::default()), repo)
    }

    #[tokio::test]
    async fn test_statistics_on_empty_set() {
        let (service, _) = service_with(vec![]).await;
        let stats = service.statistics().await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.resolution_rate, 0.0);
    }

    #[tokio::test]
    async fn test_statistics_counts() {
        let critical = alert(Severity::Critical, 1);
        let high = alert(Severity::High, 2);
        let (service, _) = service_with(vec![critical.clone(), high, alert(Severity::High, 3), alert(Severity::High, 4)]).await;

        service.resolve(critical.id, "Blocked recipient", "admin-1").await.unwrap();

        let stats = service.statistics().await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.open, 3);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.critical, 1);
        assert_eq!(stats.resolution_rate, 25.0);
    }

    #[tokio::test]
    async fn test_resolve_lifecycle() {
        let open = alert(Severity::Critical, 1);
        let (service, _) = service_with(vec![open.clone()]).await;

        let resolved = service.resolve(open.id, "Blocked recipient", "admin-1").await.unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(resolved.reviewed_by.as_deref(), Some("admin-1"));
        assert_eq!(resolved.action.as_deref(), Some("Blocked recipient"));
        assert!(resolved.reviewed_at.is_some());

        let again = service.resolve(open.id, "again", "admin-2").await.unwrap_err();
        assert!(matches!(again, Error::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_resolve_unknown_alert() {
        let (service, _) = service_with(vec![]).await;
        let err = service.resolve(Uuid::new_v4(), "x", "admin-1").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Fraud alert not found");
    }

    #[tokio::test]
    async fn test_concurrent_reviews_apply_once() {
        let open = alert(Severity::Critical, 1);
        let (service, repo) = service_with(vec![open.clone()]).await;
        repo.set_yield_on_io(true);

        let (resolved, dismissed) = tokio::join!(
            service.resolve(open.id, "Blocked recipient", "admin-1"),
            service.dismiss(open.id, "False positive", "admin-2"),
        );

        assert_ne!(resolved.is_ok(), dismissed.is_ok());
        let loser = if resolved.is_ok() { dismissed } else { resolved };
        assert!(matches!(loser.unwrap_err(), Error::InvalidTransition(_)));

        let stored = repo.alerts().remove(0);
        let expected_reviewer = match stored.status {
            AlertStatus::Resolved => "admin-1",
            _ => "admin-2",
        };
        assert_eq!(stored.reviewed_by.as_deref(), Some(expected_reviewer));
    }

    #[tokio::test]
    async fn test_dismiss() {
        let open = alert(Severity::High, 1);
        let (service, _) = service_with(vec![open.clone()]).await;
        let dismissed = service.dismiss(open.id, "False positive", "analyst-7").await.unwrap();
        assert_eq!(dismissed.status, AlertStatus::Dismissed);
    }

    #[tokio::test]
    async fn test_list_newest_first_and_capped() {
        let alerts: Vec<_> = (0..60).map(|i| alert(Severity::High, i)).collect();
        let newest = alerts[0].id;
        let (service, _) = service_with(alerts).await;

        let listed = service.list_alerts(None).await.unwrap();
        assert_eq!(listed.len(), 50);
        assert_eq!(listed[0].id, newest);
    }

    #[tokio::test]
    async fn test_list_by_user() {
        let mine = alert(Severity::High, 1);
        let (service, _) = service_with(vec![mine.clone(), alert(Severity::High, 2)]).await;

        let listed = service.list_alerts(Some(mine.user_id)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
    }

    #[tokio::test]
    async fn test_get_unknown_alert() {
        let (service, _) = service_with(vec![]).await;
        assert!(service.get_alert(Uuid::new_v4()).await.unwrap_err().is_not_found());
    }
}
