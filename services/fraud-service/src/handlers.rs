use crate::database;
use crate::errors::{ApiError, ApiResult};
use crate::models::*;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use fraud_engine::{metrics, AlertStatus, CheckRequest};
use tracing::warn;
use uuid::Uuid;

/// Header carrying the authenticated reviewer, set by the gateway
pub const REVIEWER_HEADER: &str = "X-Reviewer-Id";

// ===== Health Check =====
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let storage = match &state.pool {
        Some(pool) => match database::health_check(pool).await {
            Ok(()) => "connected",
            Err(e) => {
                warn!("Database health check failed: {}", e);
                "disconnected"
            }
        },
        None => "memory",
    };

    let body = HealthResponse {
        status: if storage == "disconnected" { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: storage.to_string(),
        queued_checks: state.queue.len(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    };

    if storage == "disconnected" {
        HttpResponse::ServiceUnavailable().json(body)
    } else {
        HttpResponse::Ok().json(body)
    }
}

// ===== Prometheus =====
pub async fn prometheus_metrics() -> ApiResult<HttpResponse> {
    let body = metrics::render().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

// ===== List Alerts =====
pub async fn list_alerts(
    query: web::Query<ListAlertsQuery>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let alerts = state.review.list_alerts(query.user_id).await?;
    Ok(HttpResponse::Ok().json(alerts))
}

// ===== Get Alert =====
pub async fn get_alert(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let alert = state.review.get_alert(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(alert))
}

// ===== Review Alert =====
pub async fn update_alert(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<UpdateAlertRequest>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let alert_id = path.into_inner();
    let body = body.into_inner();

    let reviewer = req
        .headers()
        .get(REVIEWER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("{} header is required", REVIEWER_HEADER)))?;

    if body.action.trim().is_empty() {
        return Err(ApiError::Validation("action must not be empty".to_string()));
    }

    let alert = match body.status.unwrap_or(AlertStatus::Resolved) {
        AlertStatus::Resolved => state.review.resolve(alert_id, &body.action, reviewer).await?,
        AlertStatus::Dismissed => state.review.dismiss(alert_id, &body.action, reviewer).await?,
        AlertStatus::Open => {
            return Err(ApiError::Validation(
                "status must be RESOLVED or DISMISSED".to_string(),
            ))
        }
    };

    Ok(HttpResponse::Ok().json(alert))
}

// ===== Statistics =====
pub async fn get_statistics(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let stats = state.review.statistics().await?;
    Ok(HttpResponse::Ok().json(stats))
}

// ===== Submit Check =====
pub async fn submit_check(
    body: web::Json<CheckRequest>,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    if request.amount <= 0 {
        return Err(ApiError::Validation("amount must be positive".to_string()));
    }

    let transaction_id = request.transaction_id;
    state.dispatcher.check_transaction(request).await;

    Ok(HttpResponse::Accepted().json(CheckAccepted {
        transaction_id,
        status: "QUEUED".to_string(),
    }))
}

// ===== Configure Routes =====
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/fraud")
            .route("/alerts", web::get().to(list_alerts))
            .route("/alerts/{id}", web::get().to(get_alert))
            .route("/alerts/{id}", web::put().to(update_alert))
            .route("/statistics", web::get().to(get_statistics))
            .route("/checks", web::post().to(submit_check)),
    )
    .route("/health", web::get().to(health_check))
    .route("/metrics", web::get().to(prometheus_metrics));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use chrono::Utc;
    use fraud_engine::{
        AlertConfig, AlertReviewService, AlertStatistics, FraudAlert, FraudRepository,
        InMemoryRepository, InProcessQueue, JobOptions, QueueDispatcher, Severity,
    };
    use std::sync::Arc;

    fn state(repo: Arc<InMemoryRepository>) -> web::Data<AppState> {
        let queue = InProcessQueue::new(16);
        let dispatcher = QueueDispatcher::new(Arc::new(queue.clone()), JobOptions::default());
        let review = AlertReviewService::new(repo, AlertConfig::default());
        web::Data::new(AppState::new(review, dispatcher, queue, None))
    }

    async fn seeded_alert(repo: &InMemoryRepository, severity: Severity) -> FraudAlert {
        let alert = FraudAlert {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            severity,
            status: AlertStatus::Open,
            description: "Recipient is blacklisted".to_string(),
            rule_names: "blacklist_recipient".to_string(),
            created_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            action: None,
        };
        repo.create_alert(&alert).await.unwrap().into_alert()
    }

    #[actix_web::test]
    async fn test_get_unknown_alert_is_404() {
        let repo = Arc::new(InMemoryRepository::new());
        let app = test::init_service(
            App::new()
                .app_data(state(repo))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/fraud/alerts/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "NOT_FOUND");
        assert_eq!(body["message"], "Fraud alert not found");
    }

    #[actix_web::test]
    async fn test_resolve_then_conflict() {
        let repo = Arc::new(InMemoryRepository::new());
        let alert = seeded_alert(&repo, Severity::Critical).await;
        let app = test::init_service(
            App::new()
                .app_data(state(repo))
                .configure(configure_routes),
        )
        .await;

        let uri = format!("/api/v1/fraud/alerts/{}", alert.id);
        let req = test::TestRequest::put()
            .uri(&uri)
            .insert_header((REVIEWER_HEADER, "admin-1"))
            .set_json(serde_json::json!({"status": "RESOLVED", "action": "Blocked recipient"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "RESOLVED");
        assert_eq!(body["reviewedBy"], "admin-1");
        assert_eq!(body["action"], "Blocked recipient");
        assert_eq!(body["rule"], "blacklist_recipient");

        let req = test::TestRequest::put()
            .uri(&uri)
            .insert_header((REVIEWER_HEADER, "admin-2"))
            .set_json(serde_json::json!({"status": "DISMISSED", "action": "again"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn test_review_requires_reviewer() {
        let repo = Arc::new(InMemoryRepository::new());
        let alert = seeded_alert(&repo, Severity::High).await;
        let app = test::init_service(
            App::new()
                .app_data(state(repo))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/fraud/alerts/{}", alert.id))
            .set_json(serde_json::json!({"action": "False positive"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_list_and_statistics() {
        let repo = Arc::new(InMemoryRepository::new());
        let mine = seeded_alert(&repo, Severity::Critical).await;
        seeded_alert(&repo, Severity::High).await;
        let app = test::init_service(
            App::new()
                .app_data(state(repo))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/fraud/alerts?userId={}", mine.user_id))
            .to_request();
        let alerts: Vec<FraudAlert> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, mine.id);

        let req = test::TestRequest::get()
            .uri("/api/v1/fraud/statistics")
            .to_request();
        let stats: AlertStatistics = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.open, 2);
        assert_eq!(stats.critical, 1);
        assert_eq!(stats.resolution_rate, 0.0);
    }

    #[actix_web::test]
    async fn test_submit_check_is_queued() {
        let repo = Arc::new(InMemoryRepository::new());
        let data = state(repo);
        let app = test::init_service(
            App::new()
                .app_data(data.clone())
                .configure(configure_routes),
        )
        .await;

        let transaction_id = Uuid::new_v4();
        let req = test::TestRequest::post()
            .uri("/api/v1/fraud/checks")
            .set_json(serde_json::json!({
                "userId": Uuid::new_v4(),
                "transactionId": transaction_id,
                "transactionType": "TRANSFER",
                "amount": 5000,
                "description": "rent",
                "metadata": {"recipientId": Uuid::new_v4()}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let body: CheckAccepted = test::read_body_json(resp).await;
        assert_eq!(body.transaction_id, transaction_id);
        assert_eq!(data.queue.len(), 1);
    }

    #[actix_web::test]
    async fn test_health_on_memory_backend() {
        let repo = Arc::new(InMemoryRepository::new());
        let app = test::init_service(
            App::new()
                .app_data(state(repo))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.storage, "memory");
    }
}
