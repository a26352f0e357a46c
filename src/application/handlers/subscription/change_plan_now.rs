//! ChangePlanNowHandler - Command handler for immediate plan changes.

use std::sync::Arc;

use crate::config::BillingPolicy;
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{PlanType, Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{LifecycleEvent, Notifier, ProcessorClient, SubscriptionStore};

/// Command to switch the billed plan within the current cycle.
#[derive(Debug, Clone)]
pub struct ChangePlanNowCommand {
    pub user_id: UserId,
    pub new_plan: PlanType,
}

#[derive(Debug, Clone)]
pub struct ChangePlanNowResult {
    pub subscription: Subscription,
}

/// Handler for immediate plan changes.
///
/// The processor revise happens before the local commit; if the revise
/// fails the local row never moves. Changes too close to the period
/// boundary are refused because the processor may have already queued
/// the renewal charge against the old plan.
pub struct ChangePlanNowHandler {
    store: Arc<dyn SubscriptionStore>,
    processor: Arc<dyn ProcessorClient>,
    notifier: Arc<dyn Notifier>,
    policy: BillingPolicy,
}

impl ChangePlanNowHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        processor: Arc<dyn ProcessorClient>,
        notifier: Arc<dyn Notifier>,
        policy: BillingPolicy,
    ) -> Self {
        Self {
            store,
            processor,
            notifier,
            policy,
        }
    }

    pub async fn handle(
        &self,
        cmd: ChangePlanNowCommand,
    ) -> Result<ChangePlanNowResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_user_id(&cmd.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_user(cmd.user_id.clone()))?;

        if subscription.status != SubscriptionStatus::Active {
            return Err(SubscriptionError::invalid_state(
                format!("{:?}", subscription.status),
                "change the plan of",
            ));
        }

        if !subscription.plan_type.allows_immediate_change_to(cmd.new_plan) {
            return Err(SubscriptionError::validation(
                "new_plan",
                format!(
                    "Cannot change {} to {} within the current cycle",
                    subscription.plan_type.display_name(),
                    cmd.new_plan.display_name()
                ),
            ));
        }

        let now = Timestamp::now();
        let expires_at = subscription.expires_at.ok_or_else(|| {
            SubscriptionError::infrastructure("Active subscription has no expiry")
        })?;
        if !now
            .add_hours(self.policy.plan_change_cutoff_hours as i64)
            .is_before(&expires_at)
        {
            return Err(SubscriptionError::validation(
                "new_plan",
                "Too close to the renewal date for an immediate change, schedule it for the next period instead",
            ));
        }

        let remote_id = subscription
            .remote_subscription_id
            .clone()
            .ok_or_else(|| {
                SubscriptionError::infrastructure("Active subscription has no remote id")
            })?;

        self.processor
            .revise_subscription(&remote_id, cmd.new_plan)
            .await?;

        let old_plan = subscription.plan_type;
        subscription.change_plan_now(cmd.new_plan, now)?;
        self.store.update(&subscription).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            from = %old_plan,
            to = %subscription.plan_type,
            "Plan changed immediately"
        );
        if let Err(e) = self
            .notifier
            .notify(
                &subscription.user_id,
                LifecycleEvent::PlanChanged {
                    from: old_plan,
                    to: subscription.plan_type,
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

        Ok(ChangePlanNowResult { subscription })
    }
}
