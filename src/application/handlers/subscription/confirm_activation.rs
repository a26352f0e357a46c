//! ConfirmActivationHandler - Command handler for completing approval.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{LifecycleEvent, Notifier, ProcessorClient, RemoteStatus, SubscriptionStore};

/// Command to confirm a pending subscription after the user returns
/// from the processor's approval flow.
#[derive(Debug, Clone)]
pub struct ConfirmActivationCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct ConfirmActivationResult {
    pub subscription: Subscription,
}

/// Handler for confirming activation.
///
/// Redirect back from the approval flow proves nothing by itself, so
/// the remote status is always fetched and only ACTIVE activates the
/// local row.
pub struct ConfirmActivationHandler {
    store: Arc<dyn SubscriptionStore>,
    processor: Arc<dyn ProcessorClient>,
    notifier: Arc<dyn Notifier>,
}

impl ConfirmActivationHandler {
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
        cmd: ConfirmActivationCommand,
    ) -> Result<ConfirmActivationResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_user_id(&cmd.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_user(cmd.user_id.clone()))?;

        // A duplicate confirmation callback is not an error.
        if subscription.status == SubscriptionStatus::Active {
            return Ok(ConfirmActivationResult { subscription });
        }

        if subscription.status != SubscriptionStatus::Pending {
            return Err(SubscriptionError::invalid_state(
                format!("{:?}", subscription.status),
                "confirm activation of",
            ));
        }

        let remote_id = subscription
            .remote_subscription_id
            .clone()
            .ok_or_else(|| {
                SubscriptionError::infrastructure("Pending subscription has no remote id")
            })?;

        let remote_status = self.processor.get_subscription_status(&remote_id).await?;

        match remote_status {
            RemoteStatus::Active => {
                subscription.activate(Timestamp::now())?;
                self.store.update(&subscription).await?;

                tracing::info!(
                    user_id = %subscription.user_id,
                    plan = %subscription.plan_type,
                    "Subscription activated"
                );
                self.notify(
                    &subscription,
                    LifecycleEvent::Activated {
                        plan: subscription.plan_type,
                    },
                )
                .await;

                Ok(ConfirmActivationResult { subscription })
            }
            RemoteStatus::ApprovalPending | RemoteStatus::Approved => {
                // Payment has not been captured yet; the caller may retry
                // once the processor finishes.
                Err(SubscriptionError::invalid_state(
                    format!("remote {:?}", remote_status),
                    "activate",
                ))
            }
            RemoteStatus::Cancelled | RemoteStatus::Expired => {
                Err(SubscriptionError::resubscription_required(format!(
                    "Remote subscription ended as {:?} before approval completed",
                    remote_status
                )))
            }
            RemoteStatus::Suspended | RemoteStatus::Unknown => {
                Err(SubscriptionError::processor_fatal(format!(
                    "Unexpected remote status {:?} while confirming activation",
                    remote_status
                )))
            }
        }
    }

    async fn notify(&self, subscription: &Subscription, event: LifecycleEvent) {
        if let Err(e) = self.notifier.notify(&subscription.user_id, event).await {
            tracing::warn!(
                user_id = %subscription.user_id,
                error = %e,
                "Failed to deliver lifecycle notification"
            );
        }
    }
}
