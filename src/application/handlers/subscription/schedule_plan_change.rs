//! SchedulePlanChangeHandler - Command handler for deferred plan changes.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{PlanType, Subscription, SubscriptionError};
use crate::ports::{LifecycleEvent, Notifier, SubscriptionStore};

/// Command to schedule a plan change for the end of the current period.
#[derive(Debug, Clone)]
pub struct SchedulePlanChangeCommand {
    pub user_id: UserId,
    pub new_plan: PlanType,
}

#[derive(Debug, Clone)]
pub struct SchedulePlanChangeResult {
    pub subscription: Subscription,
}

/// Handler for scheduling plan changes.
///
/// Purely local; the processor is not touched until the reconciler
/// applies the change at period end.
pub struct SchedulePlanChangeHandler {
    store: Arc<dyn SubscriptionStore>,
    notifier: Arc<dyn Notifier>,
}

impl SchedulePlanChangeHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn handle(
        &self,
        cmd: SchedulePlanChangeCommand,
    ) -> Result<SchedulePlanChangeResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_user_id(&cmd.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_user(cmd.user_id.clone()))?;

        subscription.schedule_plan_change(cmd.new_plan, Timestamp::now())?;
        self.store.update(&subscription).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            to = %cmd.new_plan,
            starts_at = ?subscription.next_plan_starts_at,
            "Plan change scheduled"
        );
        if let Err(e) = self
            .notifier
            .notify(
                &subscription.user_id,
                LifecycleEvent::PlanChangeScheduled { to: cmd.new_plan },
            )
            .await
        {
            tracing::warn!(
                user_id = %subscription.user_id,
                error = %e,
                "Failed to deliver lifecycle notification"
            );
        }

        Ok(SchedulePlanChangeResult { subscription })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::application::handlers::subscription::mocks::CollectingNotifier;
    use crate::domain::foundation::SubscriptionId;

    fn test_user_id() -> UserId {
        UserId::new("user-123").unwrap()
    }

    async fn seed_active(store: &InMemorySubscriptionStore, plan: PlanType) -> Subscription {
        let mut sub = Subscription::create_pending(
            SubscriptionId::new(),
            test_user_id(),
            plan,
            "I-REMOTE1".to_string(),
            Timestamp::now(),
        );
        sub.activate(Timestamp::now()).unwrap();
        store.insert(&sub).await.unwrap();
        sub
    }

    #[tokio::test]
    async fn schedules_downgrade_for_period_end() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let before = seed_active(&store, PlanType::Yearly).await;
        let handler = SchedulePlanChangeHandler::new(store.clone(), notifier.clone());

        let result = handler
            .handle(SchedulePlanChangeCommand {
                user_id: test_user_id(),
                new_plan: PlanType::Monthly,
            })
            .await
            .unwrap();

        assert_eq!(result.subscription.next_plan_type, Some(PlanType::Monthly));
        assert_eq!(result.subscription.next_plan_starts_at, before.expires_at);
        // The billed plan stays put until the reconciler applies it.
        assert_eq!(result.subscription.plan_type, PlanType::Yearly);
        assert!(matches!(
            notifier.events().as_slice(),
            [(_, LifecycleEvent::PlanChangeScheduled { to: PlanType::Monthly })]
        ));
    }

    #[tokio::test]
    async fn rejects_second_schedule() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let notifier = Arc::new(CollectingNotifier::new());
        seed_active(&store, PlanType::Yearly).await;
        let handler = SchedulePlanChangeHandler::new(store, notifier);

        let cmd = SchedulePlanChangeCommand {
            user_id: test_user_id(),
            new_plan: PlanType::Monthly,
        };
        handler.handle(cmd.clone()).await.unwrap();
        let result = handler.handle(cmd).await;

        assert!(matches!(result, Err(SubscriptionError::ValidationFailed { .. })));
    }

    #[tokio::test]
    async fn rejects_schedule_outside_active() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let mut sub = seed_active(&store, PlanType::Yearly).await;
        sub.cancel(Timestamp::now()).unwrap();
        store.update(&sub).await.unwrap();
        let handler = SchedulePlanChangeHandler::new(store, notifier);

        let result = handler
            .handle(SchedulePlanChangeCommand {
                user_id: test_user_id(),
                new_plan: PlanType::Monthly,
            })
            .await;

        assert!(matches!(result, Err(SubscriptionError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn missing_subscription_is_not_found() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let handler = SchedulePlanChangeHandler::new(store, notifier);

        let result = handler
            .handle(SchedulePlanChangeCommand {
                user_id: test_user_id(),
                new_plan: PlanType::Monthly,
            })
            .await;

        assert!(matches!(result, Err(SubscriptionError::NotFoundForUser(_))));
    }
}
