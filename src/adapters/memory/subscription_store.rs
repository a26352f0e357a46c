//! In-memory subscription store implementation.
//!
//! This adapter provides an in-memory implementation of the
//! `SubscriptionStore` port. Useful for development, testing, and
//! demonstration. For production use the PostgreSQL-backed store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::SubscriptionStore;

/// In-memory implementation of the SubscriptionStore port.
///
/// Thread-safe via internal `Mutex`. Applies the same version
/// compare-and-swap discipline as the PostgreSQL store, so concurrency
/// tests exercise the real conflict behavior.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    rows: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl InMemorySubscriptionStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of rows. Useful for tests.
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Returns true if no rows exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> Result<(), SubscriptionError> {
        let mut rows = self.rows.lock().unwrap();

        if rows.values().any(|s| s.user_id == subscription.user_id) {
            return Err(SubscriptionError::already_exists(
                subscription.user_id.clone(),
            ));
        }

        rows.insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), SubscriptionError> {
        let mut rows = self.rows.lock().unwrap();

        let stored = rows
            .get_mut(&subscription.id)
            .ok_or_else(|| SubscriptionError::not_found(subscription.id.clone()))?;

        if stored.version != subscription.version {
            return Err(SubscriptionError::conflict("Subscription"));
        }

        let mut updated = subscription.clone();
        updated.version += 1;
        *stored = updated;
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|s| s.user_id == *user_id)
            .cloned())
    }

    async fn find_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|s| s.remote_subscription_id.as_deref() == Some(remote_id))
            .cloned())
    }

    async fn find_due_plan_changes(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        let rows = self.rows.lock().unwrap();

        let mut due: Vec<Subscription> = rows
            .values()
            .filter(|s| {
                s.status == SubscriptionStatus::Active
                    && matches!(s.next_plan_starts_at, Some(starts_at) if !now.is_before(&starts_at))
            })
            .cloned()
            .collect();

        due.sort_by_key(|s| s.next_plan_starts_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn find_lapsed_cancellations(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        let rows = self.rows.lock().unwrap();

        let mut lapsed: Vec<Subscription> = rows
            .values()
            .filter(|s| {
                s.status == SubscriptionStatus::Cancelled
                    && matches!(s.expires_at, Some(expires_at) if !now.is_before(&expires_at))
            })
            .cloned()
            .collect();

        lapsed.sort_by_key(|s| s.expires_at);
        lapsed.truncate(limit as usize);
        Ok(lapsed)
    }
}
