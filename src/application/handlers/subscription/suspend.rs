//! SuspendSubscriptionHandler - Command handler for pausing billing.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{LifecycleEvent, Notifier, ProcessorClient, SubscriptionStore};

/// Command to suspend a subscription.
#[derive(Debug, Clone)]
pub struct SuspendSubscriptionCommand {
    pub user_id: UserId,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct SuspendSubscriptionResult {
    pub subscription: Subscription,
}

/// Handler for suspending subscriptions.
///
/// Suspension pauses billing and revokes access immediately. The remote
/// suspend runs first; the local row only flips once the processor has
/// stopped charging.
pub struct SuspendSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
    processor: Arc<dyn ProcessorClient>,
    notifier: Arc<dyn Notifier>,
}

impl SuspendSubscriptionHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        processor: Arc<dyn ProcessorClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            processor,
            notifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: SuspendSubscriptionCommand,
    ) -> Result<SuspendSubscriptionResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_user_id(&cmd.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_user(cmd.user_id.clone()))?;

        // A repeated suspend is not an error.
        if subscription.status == SubscriptionStatus::Suspended {
            return Ok(SuspendSubscriptionResult { subscription });
        }

        if subscription.status != SubscriptionStatus::Active {
            return Err(SubscriptionError::invalid_state(
                format!("{:?}", subscription.status),
                "suspend",
            ));
        }

        let remote_id = subscription
            .remote_subscription_id
            .clone()
            .ok_or_else(|| {
                SubscriptionError::infrastructure("Active subscription has no remote id")
            })?;
        self.processor
            .suspend_subscription(&remote_id, &cmd.reason)
            .await?;

        subscription.suspend(Timestamp::now())?;
        self.store.update(&subscription).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            reason = %cmd.reason,
            "Subscription suspended"
        );
        if let Err(e) = self
            .notifier
            .notify(&subscription.user_id, LifecycleEvent::Suspended)
            .await
        {
            tracing::warn!(
                user_id = %subscription.user_id,
                error = %e,
                "Failed to deliver lifecycle notification"
            );
        }

        Ok(SuspendSubscriptionResult { subscription })
    }
}
