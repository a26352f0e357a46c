//! SubscribeHandler - Command handler for starting a subscription.

use std::sync::Arc;

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{PlanType, Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{ProcessorClient, SubscriptionStore};

/// Command to start a subscription for a user.
#[derive(Debug, Clone)]
pub struct SubscribeCommand {
    pub user_id: UserId,
    pub plan_type: PlanType,
}

/// Result of a successful subscribe.
///
/// The subscription is Pending; the caller redirects the user to
/// `approval_url` to complete payment approval.
#[derive(Debug, Clone)]
pub struct SubscribeResult {
    pub subscription: Subscription,
    pub approval_url: String,
}

/// Handler for starting subscriptions.
///
/// Creates the remote resource first, then the local row, so an
/// interrupted run never leaves a charging remote subscription without a
/// local record the user can see.
pub struct SubscribeHandler {
    store: Arc<dyn SubscriptionStore>,
    processor: Arc<dyn ProcessorClient>,
}

impl SubscribeHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, processor: Arc<dyn ProcessorClient>) -> Self {
        Self { store, processor }
    }

    pub async fn handle(&self, cmd: SubscribeCommand) -> Result<SubscribeResult, SubscriptionError> {
        if !cmd.plan_type.is_paid() {
            return Err(SubscriptionError::validation(
                "plan_type",
                "Only paid plans can be subscribed to",
            ));
        }

        let existing = self.store.find_by_user_id(&cmd.user_id).await?;

        match existing {
            None => self.subscribe_fresh(cmd).await,
            Some(subscription) => match subscription.status {
                // An abandoned approval or a finished lifecycle may be
                // restarted in place.
                SubscriptionStatus::Pending | SubscriptionStatus::Expired => {
                    self.resubscribe(cmd, subscription).await
                }
                SubscriptionStatus::Cancelled => {
                    let now = Timestamp::now();
                    if subscription.has_access(now) {
                        // Still inside the paid period; reactivation is the
                        // right operation, not a second subscription.
                        Err(SubscriptionError::already_exists(cmd.user_id))
                    } else {
                        self.resubscribe(cmd, subscription).await
                    }
                }
                _ => Err(SubscriptionError::already_exists(cmd.user_id)),
            },
        }
    }

    async fn subscribe_fresh(
        &self,
        cmd: SubscribeCommand,
    ) -> Result<SubscribeResult, SubscriptionError> {
        let created = self
            .processor
            .create_subscription(cmd.plan_type, cmd.user_id.as_str())
            .await?;

        let subscription = Subscription::create_pending(
            SubscriptionId::new(),
            cmd.user_id,
            cmd.plan_type,
            created.remote_id,
            Timestamp::now(),
        );

        self.store.insert(&subscription).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            plan = %subscription.plan_type,
            "Subscription created, awaiting approval"
        );

        Ok(SubscribeResult {
            subscription,
            approval_url: created.approval_url,
        })
    }

    async fn resubscribe(
        &self,
        cmd: SubscribeCommand,
        mut subscription: Subscription,
    ) -> Result<SubscribeResult, SubscriptionError> {
        let created = self
            .processor
            .create_subscription(cmd.plan_type, cmd.user_id.as_str())
            .await?;

        // Best-effort cleanup of the superseded remote resource; a stale
        // unapproved subscription never charges, so failure here is only
        // logged.
        if subscription.status == SubscriptionStatus::Pending {
            if let Some(old_remote) = subscription.remote_subscription_id.clone() {
                if let Err(e) = self
                    .processor
                    .cancel_subscription(&old_remote, "Replaced by a new subscription attempt")
                    .await
                {
                    tracing::warn!(
                        remote_id = %old_remote,
                        error = %e,
                        "Failed to cancel superseded remote subscription"
                    );
                }
            }
        }

        subscription.resubscribe(cmd.plan_type, created.remote_id, Timestamp::now())?;
        self.store.update(&subscription).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            plan = %subscription.plan_type,
            "Subscription restarted, awaiting approval"
        );

        Ok(SubscribeResult {
            subscription,
            approval_url: created.approval_url,
        })
    }
}
