//! PostgreSQL implementation of FailureLedger.
//!
//! A partial unique index on (user_id) WHERE resolved_at IS NULL keeps
//! redelivered processor notifications from opening a second row.

use crate::domain::foundation::{PaymentFailureId, Timestamp, UserId};
use crate::domain::subscription::{FailureResolution, PaymentFailure, SubscriptionError};
use crate::ports::FailureLedger;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL implementation of the FailureLedger port.
pub struct PostgresFailureLedger {
    pool: PgPool,
}

impl PostgresFailureLedger {
    /// Creates a new PostgresFailureLedger with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, user_id, detected_at, grace_period_ends_at, retry_count,
    last_retry_at, resolved_at, resolution, created_at, updated_at
"#;

/// Database row representation of a payment failure.
#[derive(Debug, sqlx::FromRow)]
struct FailureRow {
    id: Uuid,
    user_id: String,
    detected_at: DateTime<Utc>,
    grace_period_ends_at: DateTime<Utc>,
    retry_count: i32,
    last_retry_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
    resolution: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FailureRow> for PaymentFailure {
    type Error = SubscriptionError;

    fn try_from(row: FailureRow) -> Result<Self, Self::Error> {
        Ok(PaymentFailure {
            id: PaymentFailureId::from_uuid(row.id),
            user_id: UserId::new(row.user_id)
                .map_err(|e| SubscriptionError::infrastructure(format!("Invalid user_id: {}", e)))?,
            detected_at: Timestamp::from_datetime(row.detected_at),
            grace_period_ends_at: Timestamp::from_datetime(row.grace_period_ends_at),
            retry_count: row.retry_count,
            last_retry_at: row.last_retry_at.map(Timestamp::from_datetime),
            resolved_at: row.resolved_at.map(Timestamp::from_datetime),
            resolution: row.resolution.as_deref().map(parse_resolution).transpose()?,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn parse_resolution(s: &str) -> Result<FailureResolution, SubscriptionError> {
    match s {
        "payment_recovered" => Ok(FailureResolution::PaymentRecovered),
        "grace_expired" => Ok(FailureResolution::GraceExpired),
        "cancelled" => Ok(FailureResolution::Cancelled),
        _ => Err(SubscriptionError::infrastructure(format!(
            "Invalid resolution value: {}",
            s
        ))),
    }
}

fn resolution_to_string(resolution: &FailureResolution) -> &'static str {
    match resolution {
        FailureResolution::PaymentRecovered => "payment_recovered",
        FailureResolution::GraceExpired => "grace_expired",
        FailureResolution::Cancelled => "cancelled",
    }
}

#[async_trait]
impl FailureLedger for PostgresFailureLedger {
    async fn insert(&self, failure: &PaymentFailure) -> Result<(), SubscriptionError> {
        sqlx::query(
            r#"
            INSERT INTO payment_failures (
                id, user_id, detected_at, grace_period_ends_at, retry_count,
                last_retry_at, resolved_at, resolution, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(failure.id.as_uuid())
        .bind(failure.user_id.as_str())
        .bind(failure.detected_at.as_datetime())
        .bind(failure.grace_period_ends_at.as_datetime())
        .bind(failure.retry_count)
        .bind(failure.last_retry_at.map(|t| *t.as_datetime()))
        .bind(failure.resolved_at.map(|t| *t.as_datetime()))
        .bind(failure.resolution.as_ref().map(resolution_to_string))
        .bind(failure.created_at.as_datetime())
        .bind(failure.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("payment_failures_unresolved_user_idx") {
                    return SubscriptionError::already_exists(failure.user_id.clone());
                }
            }
            SubscriptionError::infrastructure(format!("Failed to insert payment failure: {}", e))
        })?;

        Ok(())
    }

    async fn update(&self, failure: &PaymentFailure) -> Result<(), SubscriptionError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_failures SET
                retry_count = $2,
                last_retry_at = $3,
                resolved_at = $4,
                resolution = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(failure.id.as_uuid())
        .bind(failure.retry_count)
        .bind(failure.last_retry_at.map(|t| *t.as_datetime()))
        .bind(failure.resolved_at.map(|t| *t.as_datetime()))
        .bind(failure.resolution.as_ref().map(resolution_to_string))
        .bind(failure.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            SubscriptionError::infrastructure(format!("Failed to update payment failure: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(SubscriptionError::infrastructure(
                "Payment failure not found",
            ));
        }

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &PaymentFailureId,
    ) -> Result<Option<PaymentFailure>, SubscriptionError> {
        let row: Option<FailureRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_failures WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            SubscriptionError::infrastructure(format!("Failed to find payment failure: {}", e))
        })?;

        row.map(PaymentFailure::try_from).transpose()
    }

    async fn find_unresolved_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PaymentFailure>, SubscriptionError> {
        let row: Option<FailureRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_failures WHERE user_id = $1 AND resolved_at IS NULL",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            SubscriptionError::infrastructure(format!("Failed to find payment failure: {}", e))
        })?;

        row.map(PaymentFailure::try_from).transpose()
    }

    async fn find_expired_grace(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<PaymentFailure>, SubscriptionError> {
        let rows: Vec<FailureRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM payment_failures
            WHERE resolved_at IS NULL
              AND grace_period_ends_at <= $1
            ORDER BY grace_period_ends_at ASC
            LIMIT $2
            "#,
            SELECT_COLUMNS
        ))
        .bind(now.as_datetime())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            SubscriptionError::infrastructure(format!(
                "Failed to find expired grace periods: {}",
                e
            ))
        })?;

        rows.into_iter().map(PaymentFailure::try_from).collect()
    }
}
