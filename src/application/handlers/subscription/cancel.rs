//! CancelSubscriptionHandler - Command handler for user cancellation.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{
    FailureResolution, Subscription, SubscriptionError, SubscriptionStatus,
};
use crate::ports::{FailureLedger, LifecycleEvent, Notifier, ProcessorClient, SubscriptionStore};

/// Command to cancel a subscription.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,

    /// Instant access ends, when the paid period is still running.
    pub access_until: Option<Timestamp>,
}

/// Handler for cancelling subscriptions.
///
/// The remote cancel runs first so the processor never charges again
/// after the local row flips. A remote resource that is already finished
/// does not block the local cancellation.
pub struct CancelSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
    ledger: Arc<dyn FailureLedger>,
    processor: Arc<dyn ProcessorClient>,
    notifier: Arc<dyn Notifier>,
}

impl CancelSubscriptionHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        ledger: Arc<dyn FailureLedger>,
        processor: Arc<dyn ProcessorClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            ledger,
            processor,
            notifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_user_id(&cmd.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_user(cmd.user_id.clone()))?;

        // A repeated cancel is not an error.
        if subscription.status == SubscriptionStatus::Cancelled {
            let access_until = subscription.expires_at;
            return Ok(CancelSubscriptionResult {
                subscription,
                access_until,
            });
        }

        if !matches!(
            subscription.status,
            SubscriptionStatus::Active
                | SubscriptionStatus::PaymentFailed
                | SubscriptionStatus::Suspended
        ) {
            return Err(SubscriptionError::invalid_state(
                format!("{:?}", subscription.status),
                "cancel",
            ));
        }

        if let Some(remote_id) = subscription.remote_subscription_id.clone() {
            self.processor
                .cancel_subscription(&remote_id, "Cancelled by user")
                .await?;
        }

        let now = Timestamp::now();
        subscription.cancel(now)?;
        self.store.update(&subscription).await?;

        self.resolve_open_failure(&cmd.user_id, now).await;

        tracing::info!(
            user_id = %subscription.user_id,
            access_until = ?subscription.expires_at,
            "Subscription cancelled"
        );
        if let Err(e) = self
            .notifier
            .notify(&subscription.user_id, LifecycleEvent::Cancelled)
            .await
        {
            tracing::warn!(
                user_id = %subscription.user_id,
                error = %e,
                "Failed to deliver lifecycle notification"
            );
        }

        let access_until = subscription.expires_at;
        Ok(CancelSubscriptionResult {
            subscription,
            access_until,
        })
    }

    /// Closes any open payment failure; cancellation ends the grace
    /// period. Failure here is logged, not propagated, because the
    /// cancellation already committed.
    async fn resolve_open_failure(&self, user_id: &UserId, now: Timestamp) {
        let open = match self.ledger.find_unresolved_by_user(user_id).await {
            Ok(open) => open,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to look up open payment failure");
                return;
            }
        };
        if let Some(mut failure) = open {
            if let Err(e) = failure
                .resolve(FailureResolution::Cancelled, now)
                .map_err(SubscriptionError::from)
            {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to resolve payment failure");
                return;
            }
            if let Err(e) = self.ledger.update(&failure).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to persist payment failure resolution");
            }
        }
    }
}
