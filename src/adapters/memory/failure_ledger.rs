//! In-memory failure ledger implementation.
//!
//! This adapter provides an in-memory implementation of the
//! `FailureLedger` port, enforcing the same one-unresolved-row-per-user
//! constraint as the PostgreSQL ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::foundation::{PaymentFailureId, Timestamp, UserId};
use crate::domain::subscription::{PaymentFailure, SubscriptionError};
use crate::ports::FailureLedger;

/// In-memory implementation of the FailureLedger port.
///
/// Thread-safe via internal `Mutex`. Suitable for testing and
/// single-server development.
#[derive(Default)]
pub struct InMemoryFailureLedger {
    rows: Mutex<HashMap<PaymentFailureId, PaymentFailure>>,
}

impl InMemoryFailureLedger {
    /// Creates a new empty ledger.
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
impl FailureLedger for InMemoryFailureLedger {
    async fn insert(&self, failure: &PaymentFailure) -> Result<(), SubscriptionError> {
        let mut rows = self.rows.lock().unwrap();

        if rows
            .values()
            .any(|f| f.user_id == failure.user_id && !f.is_resolved())
        {
            return Err(SubscriptionError::already_exists(failure.user_id.clone()));
        }

        rows.insert(failure.id.clone(), failure.clone());
        Ok(())
    }

    async fn update(&self, failure: &PaymentFailure) -> Result<(), SubscriptionError> {
        let mut rows = self.rows.lock().unwrap();

        let stored = rows
            .get_mut(&failure.id)
            .ok_or_else(|| SubscriptionError::infrastructure("Payment failure not found"))?;

        *stored = failure.clone();
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &PaymentFailureId,
    ) -> Result<Option<PaymentFailure>, SubscriptionError> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn find_unresolved_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PaymentFailure>, SubscriptionError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|f| f.user_id == *user_id && !f.is_resolved())
            .cloned())
    }

    async fn find_expired_grace(
        &self,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<PaymentFailure>, SubscriptionError> {
        let rows = self.rows.lock().unwrap();

        let mut expired: Vec<PaymentFailure> = rows
            .values()
            .filter(|f| !f.is_resolved() && f.grace_expired(now))
            .cloned()
            .collect();

        expired.sort_by_key(|f| f.grace_period_ends_at);
        expired.truncate(limit as usize);
        Ok(expired)
    }
}
