//! ReactivateSubscriptionHandler - Command handler for resuming billing.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{
    LifecycleEvent, Notifier, ProcessorClient, ProcessorErrorKind, SubscriptionStore,
};

/// Command to resume a suspended or cancelled subscription.
#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionResult {
    pub subscription: Subscription,
}

/// Handler for reactivating subscriptions.
///
/// Resuming a suspended resource is a plain processor activate. A
/// cancelled resource may already be unusable remotely; in that case the
/// user has to subscribe from scratch and the error says so.
pub struct ReactivateSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
    processor: Arc<dyn ProcessorClient>,
    notifier: Arc<dyn Notifier>,
}

impl ReactivateSubscriptionHandler {
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
        cmd: ReactivateSubscriptionCommand,
    ) -> Result<ReactivateSubscriptionResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_user_id(&cmd.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_user(cmd.user_id.clone()))?;

        // A repeated reactivation is not an error.
        if subscription.status == SubscriptionStatus::Active {
            return Ok(ReactivateSubscriptionResult { subscription });
        }

        if !matches!(
            subscription.status,
            SubscriptionStatus::Suspended | SubscriptionStatus::Cancelled
        ) {
            return Err(SubscriptionError::invalid_state(
                format!("{:?}", subscription.status),
                "reactivate",
            ));
        }

        let remote_id = subscription
            .remote_subscription_id
            .clone()
            .ok_or_else(|| SubscriptionError::infrastructure("Subscription has no remote id"))?;

        let was_cancelled = subscription.status == SubscriptionStatus::Cancelled;
        if let Err(err) = self
            .processor
            .activate_subscription(&remote_id, "Reactivated by user")
            .await
        {
            // The processor purges cancelled resources; once that happens
            // the only way forward is a new subscription.
            if was_cancelled
                && matches!(
                    err.kind,
                    ProcessorErrorKind::Rejected | ProcessorErrorKind::NotFound
                )
            {
                return Err(SubscriptionError::resubscription_required(format!(
                    "Remote subscription can no longer be reactivated: {}",
                    err
                )));
            }
            return Err(err.into());
        }

        subscription.reactivate(Timestamp::now())?;
        self.store.update(&subscription).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            "Subscription reactivated"
        );
        if let Err(e) = self
            .notifier
            .notify(
                &subscription.user_id,
                LifecycleEvent::Activated {
                    plan: subscription.plan_type,
                },
            )
            .await
        {
            tracing::warn!(
                user_id = %subscription.user_id,
                error = %e,
                "Failed to deliver lifecycle notification"
            );
        }

        Ok(ReactivateSubscriptionResult { subscription })
    }
}
