//! Subscription store port (write side).
//!
//! Defines the contract for persisting and retrieving Subscription
//! aggregates. Implementations handle the actual database operations.
//!
//! # Design
//!
//! - **Unique constraint**: Only one subscription per user
//! - **Optimistic locking**: `update` is a compare-and-swap on the
//!   aggregate's version; concurrent writers lose with `Conflict`

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError};
use async_trait::async_trait;

/// Repository port for Subscription aggregate persistence.
///
/// Implementations must ensure:
/// - Unique user_id constraint
/// - Version-checked updates for concurrent safety
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert a new subscription at version 0.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the user already has a subscription row
    /// - `Infrastructure` on persistence failure
    async fn insert(&self, subscription: &Subscription) -> Result<(), SubscriptionError>;

    /// Update an existing subscription if its stored version still equals
    /// `subscription.version`. On success the stored version becomes
    /// `subscription.version + 1`.
    ///
    /// # Errors
    ///
    /// - `Conflict` if another writer updated the row first
    /// - `NotFound` if the row does not exist
    /// - `Infrastructure` on persistence failure
    async fn update(&self, subscription: &Subscription) -> Result<(), SubscriptionError>;

    /// Find a subscription by its ID. Returns `None` if not found.
    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, SubscriptionError>;

    /// Find a subscription by user ID.
    ///
    /// This is the primary lookup since each user has at most one row.
    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, SubscriptionError>;

    /// Find a subscription by the processor's opaque id.
    ///
    /// Used when translating processor notifications back to our rows.
    async fn find_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<Subscription>, SubscriptionError>;

    /// Find active subscriptions whose scheduled plan change is due at
    /// `now`, ordered by `next_plan_starts_at`, at most `limit` rows.
    ///
    /// Only active rows qualify; a failure or cancellation parks the
    /// schedule until the row returns to active.
    async fn find_due_plan_changes(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<Subscription>, SubscriptionError>;

    /// Find cancelled subscriptions whose paid period has ended at `now`,
    /// ordered by `expires_at`, at most `limit` rows.
    ///
    /// These rows are moved to Expired by the reconciler.
    async fn find_lapsed_cancellations(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<Subscription>, SubscriptionError>;
}
