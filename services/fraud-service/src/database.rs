//! PostgreSQL-backed repository and notifier

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fraud_engine::{
    AlertFilter, AlertInsert, AlertStatus, AlertUpdate, Error, FraudAlert, FraudRepository,
    NotificationPayload, Notifier, Result, ReviewUpdate, StatusUpdate, TransactionRecord,
    TransactionStatus, TransferRecord, WalletSnapshot,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub async fn create_pool(database_url: &str, max_connections: u32) -> AnyResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> AnyResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

fn storage(err: sqlx::Error) -> Error {
    Error::Storage(err.to_string())
}

const TRANSACTION_COLUMNS: &str =
    "id, user_id, type, amount, status, description, metadata, created_at";

const ALERT_COLUMNS: &str = "id, user_id, transaction_id, severity, status, description, rule, \
     created_at, reviewed_at, reviewed_by, action";

fn transaction_from_row(row: &PgRow) -> Result<TransactionRecord> {
    let kind: String = row.try_get("type").map_err(storage)?;
    let status: String = row.try_get("status").map_err(storage)?;
    let metadata: Option<Json<HashMap<String, serde_json::Value>>> =
        row.try_get("metadata").map_err(storage)?;

    Ok(TransactionRecord {
        id: row.try_get("id").map_err(storage)?,
        user_id: row.try_get("user_id").map_err(storage)?,
        transaction_type: kind.parse()?,
        amount: row.try_get("amount").map_err(storage)?,
        status: status.parse()?,
        description: row.try_get("description").map_err(storage)?,
        metadata: metadata.map(|m| m.0).unwrap_or_default(),
        created_at: row.try_get("created_at").map_err(storage)?,
    })
}

fn alert_from_row(row: &PgRow) -> Result<FraudAlert> {
    let severity: String = row.try_get("severity").map_err(storage)?;
    let status: String = row.try_get("status").map_err(storage)?;

    Ok(FraudAlert {
        id: row.try_get("id").map_err(storage)?,
        user_id: row.try_get("user_id").map_err(storage)?,
        transaction_id: row.try_get("transaction_id").map_err(storage)?,
        severity: severity.parse()?,
        status: status.parse()?,
        description: row.try_get("description").map_err(storage)?,
        rule_names: row.try_get("rule").map_err(storage)?,
        created_at: row.try_get("created_at").map_err(storage)?,
        reviewed_at: row.try_get("reviewed_at").map_err(storage)?,
        reviewed_by: row.try_get("reviewed_by").map_err(storage)?,
        action: row.try_get("action").map_err(storage)?,
    })
}

/// `FraudRepository` over the wallet database
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FraudRepository for PgRepository {
    async fn recent_transactions(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>> {
        let query = format!(
            "SELECT {} FROM transactions
             WHERE user_id = $1 AND created_at >= $2
             ORDER BY created_at DESC
             LIMIT $3",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(since)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn recent_transfers(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransferRecord>> {
        let rows = sqlx::query(
            "SELECT id, sender_id, recipient_id, amount, created_at FROM transfers
             WHERE sender_id = $1 AND created_at >= $2
             ORDER BY created_at DESC
             LIMIT $3",
        )
        .bind(user_id)
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| -> Result<TransferRecord> {
                Ok(TransferRecord {
                    id: row.try_get("id").map_err(storage)?,
                    sender_id: row.try_get("sender_id").map_err(storage)?,
                    recipient_id: row.try_get("recipient_id").map_err(storage)?,
                    amount: row.try_get("amount").map_err(storage)?,
                    created_at: row.try_get("created_at").map_err(storage)?,
                })
            })
            .collect()
    }

    async fn wallet(&self, user_id: Uuid) -> Result<Option<WalletSnapshot>> {
        let row = sqlx::query(
            "SELECT user_id, balance, currency, updated_at FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(|row| -> Result<WalletSnapshot> {
            Ok(WalletSnapshot {
                user_id: row.try_get("user_id").map_err(storage)?,
                balance: row.try_get("balance").map_err(storage)?,
                currency: row.try_get("currency").map_err(storage)?,
                updated_at: row.try_get("updated_at").map_err(storage)?,
            })
        })
        .transpose()
    }

    async fn successful_transactions(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>> {
        let query = format!(
            "SELECT {} FROM transactions
             WHERE user_id = $1 AND created_at >= $2 AND status = $3",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(since)
            .bind(TransactionStatus::Completed.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn create_alert(&self, alert: &FraudAlert) -> Result<AlertInsert> {
        let query = format!(
            "INSERT INTO fraud_alerts ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (transaction_id) DO NOTHING
             RETURNING {}",
            ALERT_COLUMNS, ALERT_COLUMNS
        );
        let inserted = sqlx::query(&query)
            .bind(alert.id)
            .bind(alert.user_id)
            .bind(alert.transaction_id)
            .bind(alert.severity.as_str())
            .bind(alert.status.as_str())
            .bind(&alert.description)
            .bind(&alert.rule_names)
            .bind(alert.created_at)
            .bind(alert.reviewed_at)
            .bind(&alert.reviewed_by)
            .bind(&alert.action)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        if let Some(row) = inserted {
            return Ok(AlertInsert::Created(alert_from_row(&row)?));
        }

        let query = format!(
            "SELECT {} FROM fraud_alerts WHERE transaction_id = $1",
            ALERT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(alert.transaction_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        Ok(AlertInsert::Existing(alert_from_row(&row)?))
    }

    async fn update_transaction_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> Result<StatusUpdate> {
        // Terminal rows are never rewritten
        let applied = sqlx::query(
            "UPDATE transactions SET status = $2, updated_at = NOW()
             WHERE id = $1 AND status NOT IN ($3, $4)",
        )
        .bind(transaction_id)
        .bind(status.as_str())
        .bind(TransactionStatus::Failed.as_str())
        .bind(TransactionStatus::Cancelled.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage)?
        .rows_affected();

        if applied > 0 {
            return Ok(StatusUpdate::Applied);
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM transactions WHERE id = $1")
                .bind(transaction_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;

        match current {
            Some(status) => Ok(StatusUpdate::AlreadyTerminal(status.parse()?)),
            None => Ok(StatusUpdate::NotFound),
        }
    }

    async fn find_alert(&self, alert_id: Uuid) -> Result<Option<FraudAlert>> {
        let query = format!("SELECT {} FROM fraud_alerts WHERE id = $1", ALERT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(alert_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(alert_from_row).transpose()
    }

    async fn update_alert(&self, alert_id: Uuid, update: AlertUpdate) -> Result<ReviewUpdate> {
        let query = format!(
            "UPDATE fraud_alerts
             SET status = $2, action = $3, reviewed_by = $4, reviewed_at = $5
             WHERE id = $1 AND status = $6
             RETURNING {}",
            ALERT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(alert_id)
            .bind(update.status.as_str())
            .bind(&update.action)
            .bind(&update.reviewed_by)
            .bind(update.reviewed_at)
            .bind(AlertStatus::Open.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        if let Some(row) = row {
            return Ok(ReviewUpdate::Applied(alert_from_row(&row)?));
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM fraud_alerts WHERE id = $1")
                .bind(alert_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;

        match current {
            Some(status) => Ok(ReviewUpdate::NotOpen(status.parse()?)),
            None => Ok(ReviewUpdate::NotFound),
        }
    }

    async fn list_alerts(&self, user_id: Option<Uuid>, limit: usize) -> Result<Vec<FraudAlert>> {
        let query = format!(
            "SELECT {} FROM fraud_alerts
             WHERE ($1::uuid IS NULL OR user_id = $1)
             ORDER BY created_at DESC
             LIMIT $2",
            ALERT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter().map(alert_from_row).collect()
    }

    async fn count_alerts(&self, filter: AlertFilter) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM fraud_alerts
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL OR severity = $2)",
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.severity.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        Ok(count.max(0) as u64)
    }
}

/// In-app notifications written to the `notifications` table
#[derive(Clone)]
pub struct PgNotifier {
    pool: PgPool,
}

impl PgNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn send(&self, user_id: Uuid, payload: NotificationPayload) -> Result<()> {
        let data = serde_json::json!({
            "alertId": payload.alert_id,
            "severity": payload.severity,
        });

        sqlx::query(
            "INSERT INTO notifications (id, user_id, type, title, message, data, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, NOW())",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&payload.kind)
        .bind(&payload.title)
        .bind(&payload.message)
        .bind(Json(data))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Notification(e.to_string()))?;

        debug!(%user_id, alert_id = %payload.alert_id, "Notification stored");
        Ok(())
    }
}
