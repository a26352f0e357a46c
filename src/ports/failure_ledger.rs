//! Payment failure ledger port.
//!
//! Defines the contract for persisting PaymentFailure rows. The ledger
//! enforces at most one unresolved failure per user; redelivered
//! processor notifications must not open a second row.

use crate::domain::foundation::{PaymentFailureId, Timestamp, UserId};
use crate::domain::subscription::{PaymentFailure, SubscriptionError};
use async_trait::async_trait;

/// Repository port for PaymentFailure persistence.
///
/// Implementations must enforce the partial uniqueness constraint: one
/// unresolved row per user.
#[async_trait]
pub trait FailureLedger: Send + Sync {
    /// Insert a new failure row.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the user already has an unresolved failure
    /// - `Infrastructure` on persistence failure
    async fn insert(&self, failure: &PaymentFailure) -> Result<(), SubscriptionError>;

    /// Persist changes to an existing failure row.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the row does not exist
    /// - `Infrastructure` on persistence failure
    async fn update(&self, failure: &PaymentFailure) -> Result<(), SubscriptionError>;

    /// Find a failure by its ID. Returns `None` if not found.
    async fn find_by_id(
        &self,
        id: &PaymentFailureId,
    ) -> Result<Option<PaymentFailure>, SubscriptionError>;

    /// Find the user's unresolved failure, if one is open.
    async fn find_unresolved_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PaymentFailure>, SubscriptionError>;

    /// Find unresolved failures whose grace deadline has passed at `now`,
    /// ordered by `grace_period_ends_at`, at most `limit` rows.
    ///
    /// Feeds the reconciler's expiry sweep.
    async fn find_expired_grace(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<PaymentFailure>, SubscriptionError>;
}
