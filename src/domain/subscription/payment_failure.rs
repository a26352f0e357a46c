//! Payment failure ledger entity.
//!
//! Each processor-reported charge failure opens one ledger row. The row
//! tracks the grace deadline and manual retry attempts, and is resolved
//! exactly once, either by a successful payment or by grace expiry. At
//! most one unresolved row exists per user at a time.

use crate::domain::foundation::{DomainError, ErrorCode, PaymentFailureId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// How an unresolved payment failure ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureResolution {
    /// A later charge (processor retry or manual retry) succeeded.
    PaymentRecovered,

    /// The grace period ran out and the subscription expired.
    GraceExpired,

    /// The user cancelled while the failure was open.
    Cancelled,
}

/// One processor-reported charge failure and its grace window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailure {
    pub id: PaymentFailureId,

    /// User whose charge failed.
    pub user_id: UserId,

    /// When the failure notification was processed.
    pub detected_at: Timestamp,

    /// Deadline after which the subscription expires if unresolved.
    pub grace_period_ends_at: Timestamp,

    /// Number of manual retry attempts made by the user.
    pub retry_count: i32,

    /// Instant of the most recent manual retry, if any.
    pub last_retry_at: Option<Timestamp>,

    /// Set exactly once when the failure is closed.
    pub resolved_at: Option<Timestamp>,

    /// How the failure was closed. Paired with `resolved_at`.
    pub resolution: Option<FailureResolution>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentFailure {
    /// Opens a new failure with a grace window of `grace_days` days.
    pub fn open(id: PaymentFailureId, user_id: UserId, grace_days: u32, now: Timestamp) -> Self {
        Self {
            id,
            user_id,
            detected_at: now,
            grace_period_ends_at: now.add_days(grace_days as i64),
            retry_count: 0,
            last_retry_at: None,
            resolved_at: None,
            resolution: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the failure is still open.
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Whether the grace window has passed at `now`.
    pub fn grace_expired(&self, now: Timestamp) -> bool {
        !now.is_before(&self.grace_period_ends_at)
    }

    /// Records a manual retry attempt. The failure stays open; only a
    /// successful charge resolves it.
    pub fn record_retry(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.ensure_open("retry")?;
        self.retry_count += 1;
        self.last_retry_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Closes the failure. A resolved failure cannot be resolved again.
    pub fn resolve(&mut self, resolution: FailureResolution, now: Timestamp) -> Result<(), DomainError> {
        self.ensure_open("resolve")?;
        self.resolved_at = Some(now);
        self.resolution = Some(resolution);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_open(&self, attempted: &str) -> Result<(), DomainError> {
        if self.is_resolved() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot {} an already resolved payment failure", attempted),
            ));
        }
        Ok(())
    }
}
