//! ApplyScheduledChangeHandler - Command handler for due plan switches.

use std::sync::Arc;

use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::{LifecycleEvent, Notifier, ProcessorClient, SubscriptionStore};

/// Command to apply a due scheduled plan change. Driven by the
/// reconciler, never directly by users.
#[derive(Debug, Clone)]
pub struct ApplyScheduledChangeCommand {
    pub subscription_id: SubscriptionId,
}

#[derive(Debug, Clone)]
pub struct ApplyScheduledChangeResult {
    pub subscription: Subscription,
}

/// Handler for applying scheduled plan changes.
///
/// Always reloads the row and re-validates before acting, because the
/// user may have cancelled the schedule or the subscription between the
/// sweep query and this call. The processor revise runs before the
/// local commit.
pub struct ApplyScheduledChangeHandler {
    store: Arc<dyn SubscriptionStore>,
    processor: Arc<dyn ProcessorClient>,
    notifier: Arc<dyn Notifier>,
}

impl ApplyScheduledChangeHandler {
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
        cmd: ApplyScheduledChangeCommand,
    ) -> Result<ApplyScheduledChangeResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_id(&cmd.subscription_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found(cmd.subscription_id.clone()))?;

        let now = Timestamp::now();
        if !subscription.scheduled_change_due(now) {
            return Err(SubscriptionError::invalid_state(
                format!("{:?}", subscription.status),
                "apply a scheduled change to",
            ));
        }

        let new_plan = subscription.next_plan_type.ok_or_else(|| {
            SubscriptionError::infrastructure("Due schedule is missing its target plan")
        })?;
        let remote_id = subscription
            .remote_subscription_id
            .clone()
            .ok_or_else(|| SubscriptionError::infrastructure("Subscription has no remote id"))?;

        self.processor
            .revise_subscription(&remote_id, new_plan)
            .await?;

        subscription.apply_scheduled_change(now)?;
        self.store.update(&subscription).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            to = %subscription.plan_type,
            "Scheduled plan change applied"
        );
        if let Err(e) = self
            .notifier
            .notify(
                &subscription.user_id,
                LifecycleEvent::ScheduledPlanApplied {
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

        Ok(ApplyScheduledChangeResult { subscription })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::application::handlers::subscription::mocks::{
        CollectingNotifier, MockProcessorClient,
    };
    use crate::domain::foundation::UserId;
    use crate::domain::subscription::{PlanType, SubscriptionStatus};

    fn test_user_id() -> UserId {
        UserId::new("user-123").unwrap()
    }

    async fn seed_due(store: &InMemorySubscriptionStore) -> Subscription {
        let now = Timestamp::now();
        let mut sub = Subscription::create_pending(
            SubscriptionId::new(),
            test_user_id(),
            PlanType::Monthly,
            "I-REMOTE1".to_string(),
            now.add_days(-40),
        );
        sub.activate(now.add_days(-40)).unwrap();
        sub.schedule_plan_change(PlanType::Yearly, now.add_days(-35))
            .unwrap();
        store.insert(&sub).await.unwrap();
        sub
    }

    fn handler(
        store: Arc<InMemorySubscriptionStore>,
        processor: Arc<MockProcessorClient>,
        notifier: Arc<CollectingNotifier>,
    ) -> ApplyScheduledChangeHandler {
        ApplyScheduledChangeHandler::new(store, processor, notifier)
    }

    #[tokio::test]
    async fn applies_due_change_with_fresh_period() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let processor = Arc::new(MockProcessorClient::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let sub = seed_due(&store).await;
        let handler = handler(store, processor.clone(), notifier.clone());

        let result = handler
            .handle(ApplyScheduledChangeCommand {
                subscription_id: sub.id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(result.subscription.plan_type, PlanType::Yearly);
        assert_eq!(result.subscription.status, SubscriptionStatus::Active);
        assert!(result.subscription.next_plan_type.is_none());
        // The new period runs from the processing instant.
        assert!(result
            .subscription
            .expires_at
            .unwrap()
            .is_after(&Timestamp::now().add_days(300)));
        assert_eq!(
            processor.revised.lock().unwrap().as_slice(),
            &[("I-REMOTE1".to_string(), PlanType::Yearly)]
        );
        assert!(matches!(
            notifier.events().as_slice(),
            [(_, LifecycleEvent::ScheduledPlanApplied { to: PlanType::Yearly })]
        ));
    }

    #[tokio::test]
    async fn not_due_schedule_is_rejected() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let processor = Arc::new(MockProcessorClient::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let now = Timestamp::now();
        let mut sub = Subscription::create_pending(
            SubscriptionId::new(),
            test_user_id(),
            PlanType::Monthly,
            "I-REMOTE1".to_string(),
            now,
        );
        sub.activate(now).unwrap();
        sub.schedule_plan_change(PlanType::Yearly, now).unwrap();
        store.insert(&sub).await.unwrap();
        let handler = handler(store, processor.clone(), notifier);

        let result = handler
            .handle(ApplyScheduledChangeCommand {
                subscription_id: sub.id.clone(),
            })
            .await;

        assert!(matches!(result, Err(SubscriptionError::InvalidState { .. })));
        assert!(processor.revised.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_schedule_is_rejected() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let processor = Arc::new(MockProcessorClient::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let mut sub = seed_due(&store).await;
        sub.cancel_scheduled_change(Timestamp::now()).unwrap();
        store.update(&sub).await.unwrap();
        let handler = handler(store, processor, notifier);

        let result = handler
            .handle(ApplyScheduledChangeCommand {
                subscription_id: sub.id.clone(),
            })
            .await;

        assert!(matches!(result, Err(SubscriptionError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn revise_failure_keeps_schedule_for_next_sweep() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let processor = Arc::new(MockProcessorClient::failing(
            crate::ports::ProcessorError::server_error("upstream down"),
        ));
        let notifier = Arc::new(CollectingNotifier::new());
        let sub = seed_due(&store).await;
        let handler = handler(store.clone(), processor, notifier);

        let result = handler
            .handle(ApplyScheduledChangeCommand {
                subscription_id: sub.id.clone(),
            })
            .await;

        assert!(matches!(
            result,
            Err(SubscriptionError::ProcessorTransient { .. })
        ));
        let stored = store.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.next_plan_type, Some(PlanType::Yearly));
        assert_eq!(stored.plan_type, PlanType::Monthly);
    }
}
