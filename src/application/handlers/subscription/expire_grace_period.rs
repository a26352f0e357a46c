//! ExpireGracePeriodHandler - Command handler for grace-window expiry.

use std::sync::Arc;

use crate::domain::foundation::{PaymentFailureId, Timestamp};
use crate::domain::subscription::{
    FailureResolution, PaymentFailure, Subscription, SubscriptionError, SubscriptionStatus,
};
use crate::ports::{FailureLedger, LifecycleEvent, Notifier, ProcessorClient, SubscriptionStore};

/// Command to expire a subscription whose grace window ran out. Driven
/// by the reconciler.
#[derive(Debug, Clone)]
pub struct ExpireGracePeriodCommand {
    pub failure_id: PaymentFailureId,
}

#[derive(Debug, Clone)]
pub struct ExpireGracePeriodResult {
    /// None when the failure was already resolved and nothing happened.
    pub subscription: Option<Subscription>,
    pub failure: PaymentFailure,
}

/// Handler for expiring lapsed grace periods.
///
/// Re-validates everything against fresh rows: a failure resolved
/// between the sweep query and this call is left alone, and a
/// subscription that recovered meanwhile is not expired. The remote
/// cancel is best-effort; the resource stops billing on its own once
/// the processor gives up retrying.
pub struct ExpireGracePeriodHandler {
    store: Arc<dyn SubscriptionStore>,
    ledger: Arc<dyn FailureLedger>,
    processor: Arc<dyn ProcessorClient>,
    notifier: Arc<dyn Notifier>,
}

impl ExpireGracePeriodHandler {
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
        cmd: ExpireGracePeriodCommand,
    ) -> Result<ExpireGracePeriodResult, SubscriptionError> {
        let mut failure = self
            .ledger
            .find_by_id(&cmd.failure_id)
            .await?
            .ok_or_else(|| {
                SubscriptionError::infrastructure(format!(
                    "Payment failure {} no longer exists",
                    cmd.failure_id
                ))
            })?;

        // Resolved between the sweep and now; nothing to do.
        if failure.is_resolved() {
            return Ok(ExpireGracePeriodResult {
                subscription: None,
                failure,
            });
        }

        let now = Timestamp::now();
        if !failure.grace_expired(now) {
            return Err(SubscriptionError::validation(
                "grace_period",
                "Grace period is still running",
            ));
        }

        let mut subscription = self
            .store
            .find_by_user_id(&failure.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_user(failure.user_id.clone()))?;

        if subscription.status != SubscriptionStatus::PaymentFailed {
            // The subscription moved on; close the stale failure to match.
            let resolution = if subscription.status == SubscriptionStatus::Active {
                FailureResolution::PaymentRecovered
            } else {
                FailureResolution::Cancelled
            };
            failure.resolve(resolution, now)?;
            self.ledger.update(&failure).await?;
            return Ok(ExpireGracePeriodResult {
                subscription: None,
                failure,
            });
        }

        if let Some(remote_id) = subscription.remote_subscription_id.clone() {
            if let Err(e) = self
                .processor
                .cancel_subscription(&remote_id, "Grace period expired after payment failure")
                .await
            {
                tracing::warn!(
                    remote_id = %remote_id,
                    error = %e,
                    "Failed to cancel remote subscription on grace expiry"
                );
            }
        }

        subscription.expire(now)?;
        self.store.update(&subscription).await?;

        failure.resolve(FailureResolution::GraceExpired, now)?;
        self.ledger.update(&failure).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            "Subscription expired after grace period"
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

        Ok(ExpireGracePeriodResult {
            subscription: Some(subscription),
            failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryFailureLedger, InMemorySubscriptionStore};
    use crate::application::handlers::subscription::mocks::{
        CollectingNotifier, MockProcessorClient,
    };
    use crate::domain::foundation::{SubscriptionId, UserId};
    use crate::domain::subscription::PlanType;

    fn test_user_id() -> UserId {
        UserId::new("user-123").unwrap()
    }

    async fn seed_lapsed(
        store: &InMemorySubscriptionStore,
        ledger: &InMemoryFailureLedger,
    ) -> (Subscription, PaymentFailure) {
        let mut sub = Subscription::create_pending(
            SubscriptionId::new(),
            test_user_id(),
            PlanType::Monthly,
            "I-REMOTE1".to_string(),
            Timestamp::now(),
        );
        sub.activate(Timestamp::now()).unwrap();
        sub.record_payment_failure(Timestamp::now()).unwrap();
        store.insert(&sub).await.unwrap();

        let failure = PaymentFailure::open(
            PaymentFailureId::new(),
            test_user_id(),
            4,
            Timestamp::now().add_days(-10),
        );
        ledger.insert(&failure).await.unwrap();
        (sub, failure)
    }

    fn handler(
        store: Arc<InMemorySubscriptionStore>,
        ledger: Arc<InMemoryFailureLedger>,
        processor: Arc<MockProcessorClient>,
        notifier: Arc<CollectingNotifier>,
    ) -> ExpireGracePeriodHandler {
        ExpireGracePeriodHandler::new(store, ledger, processor, notifier)
    }

    #[tokio::test]
    async fn expires_subscription_and_resolves_failure() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let ledger = Arc::new(InMemoryFailureLedger::new());
        let processor = Arc::new(MockProcessorClient::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let (_, failure) = seed_lapsed(&store, &ledger).await;
        let handler = handler(store, ledger, processor.clone(), notifier.clone());

        let result = handler
            .handle(ExpireGracePeriodCommand {
                failure_id: failure.id.clone(),
            })
            .await
            .unwrap();

        let sub = result.subscription.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Expired);
        assert!(!sub.has_access(Timestamp::now()));
        assert_eq!(
            result.failure.resolution,
            Some(FailureResolution::GraceExpired)
        );
        assert_eq!(
            processor.cancelled.lock().unwrap().as_slice(),
            &["I-REMOTE1".to_string()]
        );
        assert!(matches!(
            notifier.events().as_slice(),
            [(_, LifecycleEvent::Expired)]
        ));
    }

    #[tokio::test]
    async fn already_resolved_failure_is_noop() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let ledger = Arc::new(InMemoryFailureLedger::new());
        let processor = Arc::new(MockProcessorClient::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let (_, mut failure) = seed_lapsed(&store, &ledger).await;
        failure
            .resolve(FailureResolution::PaymentRecovered, Timestamp::now())
            .unwrap();
        ledger.update(&failure).await.unwrap();
        let handler = handler(store.clone(), ledger, processor.clone(), notifier);

        let result = handler
            .handle(ExpireGracePeriodCommand {
                failure_id: failure.id.clone(),
            })
            .await
            .unwrap();

        assert!(result.subscription.is_none());
        assert!(processor.cancelled.lock().unwrap().is_empty());
        let stored = store
            .find_by_user_id(&test_user_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SubscriptionStatus::PaymentFailed);
    }

    #[tokio::test]
    async fn running_grace_window_is_refused() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let ledger = Arc::new(InMemoryFailureLedger::new());
        let processor = Arc::new(MockProcessorClient::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let mut sub = Subscription::create_pending(
            SubscriptionId::new(),
            test_user_id(),
            PlanType::Monthly,
            "I-REMOTE1".to_string(),
            Timestamp::now(),
        );
        sub.activate(Timestamp::now()).unwrap();
        sub.record_payment_failure(Timestamp::now()).unwrap();
        store.insert(&sub).await.unwrap();
        let failure = PaymentFailure::open(
            PaymentFailureId::new(),
            test_user_id(),
            4,
            Timestamp::now(),
        );
        ledger.insert(&failure).await.unwrap();
        let handler = handler(store, ledger, processor, notifier);

        let result = handler
            .handle(ExpireGracePeriodCommand {
                failure_id: failure.id.clone(),
            })
            .await;

        assert!(matches!(result, Err(SubscriptionError::ValidationFailed { .. })));
    }

    #[tokio::test]
    async fn remote_cancel_failure_still_expires_locally() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let ledger = Arc::new(InMemoryFailureLedger::new());
        let processor = Arc::new(MockProcessorClient::failing(
            crate::ports::ProcessorError::network("timeout"),
        ));
        let notifier = Arc::new(CollectingNotifier::new());
        let (_, failure) = seed_lapsed(&store, &ledger).await;
        let handler = handler(store, ledger, processor, notifier);

        let result = handler
            .handle(ExpireGracePeriodCommand {
                failure_id: failure.id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(
            result.subscription.unwrap().status,
            SubscriptionStatus::Expired
        );
    }
}
