//! ExpireLapsedCancellationHandler - Command handler for ending
//! cancelled subscriptions whose paid period ran out.

use std::sync::Arc;

use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{LifecycleEvent, Notifier, SubscriptionStore};

/// Command to move a lapsed cancelled subscription to Expired. Driven
/// by the reconciler.
#[derive(Debug, Clone)]
pub struct ExpireLapsedCancellationCommand {
    pub subscription_id: SubscriptionId,
}

#[derive(Debug, Clone)]
pub struct ExpireLapsedCancellationResult {
    pub subscription: Subscription,
}

/// Handler for expiring lapsed cancellations.
///
/// Purely local; the remote resource was already cancelled when the
/// user cancelled. Re-validates against a fresh row because the user
/// may have reactivated between the sweep query and this call.
pub struct ExpireLapsedCancellationHandler {
    store: Arc<dyn SubscriptionStore>,
    notifier: Arc<dyn Notifier>,
}

impl ExpireLapsedCancellationHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn handle(
        &self,
        cmd: ExpireLapsedCancellationCommand,
    ) -> Result<ExpireLapsedCancellationResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_id(&cmd.subscription_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found(cmd.subscription_id.clone()))?;

        if subscription.status != SubscriptionStatus::Cancelled {
            return Err(SubscriptionError::invalid_state(
                format!("{:?}", subscription.status),
                "expire",
            ));
        }

        let now = Timestamp::now();
        if subscription.has_access(now) {
            return Err(SubscriptionError::validation(
                "expires_at",
                "Paid period is still running",
            ));
        }

        subscription.expire(now)?;
        self.store.update(&subscription).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            "Cancelled subscription reached period end and expired"
        );
        if let Err(e) = self
            .notifier
            .notify(&subscription.user_id, LifecycleEvent::Expired)
            .await
        {
            tracing::warn!(
                user_id = %subscription.user_id,
                error = %e,
                "Failed to deliver lifecycle notification"
            );
        }

        Ok(ExpireLapsedCancellationResult { subscription })
    }
}
