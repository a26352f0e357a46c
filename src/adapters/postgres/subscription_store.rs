//! PostgreSQL implementation of SubscriptionStore.
//!
//! Provides persistent storage for Subscription aggregates. Updates are
//! compare-and-swap on the version column.

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{PlanType, Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::SubscriptionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL implementation of the SubscriptionStore port.
///
/// Uses sqlx for type-safe database operations with connection pooling.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    /// Creates a new PostgresSubscriptionStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, user_id, plan_type, status, remote_subscription_id,
    started_at, expires_at, auto_renewal, next_plan_type, next_plan_starts_at,
    suspended_at, cancelled_at, created_at, updated_at, version
"#;

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: String,
    plan_type: String,
    status: String,
    remote_subscription_id: Option<String>,
    started_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    auto_renewal: bool,
    next_plan_type: Option<String>,
    next_plan_starts_at: Option<DateTime<Utc>>,
    suspended_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = SubscriptionError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::new(row.user_id)
                .map_err(|e| SubscriptionError::infrastructure(format!("Invalid user_id: {}", e)))?,
            plan_type: parse_plan(&row.plan_type)?,
            status: parse_status(&row.status)?,
            remote_subscription_id: row.remote_subscription_id,
            started_at: Timestamp::from_datetime(row.started_at),
            expires_at: row.expires_at.map(Timestamp::from_datetime),
            auto_renewal: row.auto_renewal,
            next_plan_type: row.next_plan_type.as_deref().map(parse_plan).transpose()?,
            next_plan_starts_at: row.next_plan_starts_at.map(Timestamp::from_datetime),
            suspended_at: row.suspended_at.map(Timestamp::from_datetime),
            cancelled_at: row.cancelled_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

fn parse_plan(s: &str) -> Result<PlanType, SubscriptionError> {
    match s.to_lowercase().as_str() {
        "free" => Ok(PlanType::Free),
        "monthly" => Ok(PlanType::Monthly),
        "yearly" => Ok(PlanType::Yearly),
        _ => Err(SubscriptionError::infrastructure(format!(
            "Invalid plan_type value: {}",
            s
        ))),
    }
}

fn parse_status(s: &str) -> Result<SubscriptionStatus, SubscriptionError> {
    match s.to_lowercase().as_str() {
        "pending" => Ok(SubscriptionStatus::Pending),
        "active" => Ok(SubscriptionStatus::Active),
        "payment_failed" => Ok(SubscriptionStatus::PaymentFailed),
        "suspended" => Ok(SubscriptionStatus::Suspended),
        "cancelled" => Ok(SubscriptionStatus::Cancelled),
        "expired" => Ok(SubscriptionStatus::Expired),
        _ => Err(SubscriptionError::infrastructure(format!(
            "Invalid status value: {}",
            s
        ))),
    }
}

fn plan_to_string(plan: &PlanType) -> &'static str {
    match plan {
        PlanType::Free => "free",
        PlanType::Monthly => "monthly",
        PlanType::Yearly => "yearly",
    }
}

fn status_to_string(status: &SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Pending => "pending",
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::PaymentFailed => "payment_failed",
        SubscriptionStatus::Suspended => "suspended",
        SubscriptionStatus::Cancelled => "cancelled",
        SubscriptionStatus::Expired => "expired",
    }
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> Result<(), SubscriptionError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, plan_type, status, remote_subscription_id,
                started_at, expires_at, auto_renewal, next_plan_type, next_plan_starts_at,
                suspended_at, cancelled_at, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_str())
        .bind(plan_to_string(&subscription.plan_type))
        .bind(status_to_string(&subscription.status))
        .bind(&subscription.remote_subscription_id)
        .bind(subscription.started_at.as_datetime())
        .bind(subscription.expires_at.map(|t| *t.as_datetime()))
        .bind(subscription.auto_renewal)
        .bind(subscription.next_plan_type.as_ref().map(plan_to_string))
        .bind(subscription.next_plan_starts_at.map(|t| *t.as_datetime()))
        .bind(subscription.suspended_at.map(|t| *t.as_datetime()))
        .bind(subscription.cancelled_at.map(|t| *t.as_datetime()))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .bind(subscription.version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("subscriptions_user_id_key") {
                    return SubscriptionError::already_exists(subscription.user_id.clone());
                }
            }
            SubscriptionError::infrastructure(format!("Failed to insert subscription: {}", e))
        })?;

        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), SubscriptionError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                plan_type = $3,
                status = $4,
                remote_subscription_id = $5,
                started_at = $6,
                expires_at = $7,
                auto_renewal = $8,
                next_plan_type = $9,
                next_plan_starts_at = $10,
                suspended_at = $11,
                cancelled_at = $12,
                updated_at = $13,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.version)
        .bind(plan_to_string(&subscription.plan_type))
        .bind(status_to_string(&subscription.status))
        .bind(&subscription.remote_subscription_id)
        .bind(subscription.started_at.as_datetime())
        .bind(subscription.expires_at.map(|t| *t.as_datetime()))
        .bind(subscription.auto_renewal)
        .bind(subscription.next_plan_type.as_ref().map(plan_to_string))
        .bind(subscription.next_plan_starts_at.map(|t| *t.as_datetime()))
        .bind(subscription.suspended_at.map(|t| *t.as_datetime()))
        .bind(subscription.cancelled_at.map(|t| *t.as_datetime()))
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            SubscriptionError::infrastructure(format!("Failed to update subscription: {}", e))
        })?;

        if result.rows_affected() == 0 {
            // Either the row is gone or another writer bumped the version.
            let exists = self.find_by_id(&subscription.id).await?.is_some();
            return if exists {
                Err(SubscriptionError::conflict("Subscription"))
            } else {
                Err(SubscriptionError::not_found(subscription.id.clone()))
            };
        }

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            SubscriptionError::infrastructure(format!("Failed to find subscription: {}", e))
        })?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            SubscriptionError::infrastructure(format!("Failed to find subscription: {}", e))
        })?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE remote_subscription_id = $1",
            SELECT_COLUMNS
        ))
        .bind(remote_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            SubscriptionError::infrastructure(format!("Failed to find subscription: {}", e))
        })?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_due_plan_changes(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE status = 'active'
              AND next_plan_starts_at IS NOT NULL
              AND next_plan_starts_at <= $1
            ORDER BY next_plan_starts_at ASC
            LIMIT $2
            "#,
            SELECT_COLUMNS
        ))
        .bind(now.as_datetime())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            SubscriptionError::infrastructure(format!("Failed to find due plan changes: {}", e))
        })?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn find_lapsed_cancellations(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE status = 'cancelled'
              AND expires_at IS NOT NULL
              AND expires_at <= $1
            ORDER BY expires_at ASC
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
                "Failed to find lapsed cancellations: {}",
                e
            ))
        })?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}
