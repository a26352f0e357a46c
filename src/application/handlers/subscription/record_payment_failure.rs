//! RecordPaymentFailureHandler - Command handler for charge failures.

use std::sync::Arc;

use crate::config::BillingPolicy;
use crate::domain::foundation::{PaymentFailureId, Timestamp};
use crate::domain::subscription::{
    PaymentFailure, Subscription, SubscriptionError, SubscriptionStatus,
};
use crate::ports::{FailureLedger, LifecycleEvent, Notifier, SubscriptionStore};

/// Command to record a processor-reported charge failure.
///
/// Carries the processor's subscription id because that is all a
/// payment notification identifies the subscription by.
#[derive(Debug, Clone)]
pub struct RecordPaymentFailureCommand {
    pub remote_id: String,
}

#[derive(Debug, Clone)]
pub struct RecordPaymentFailureResult {
    pub subscription: Subscription,
    pub failure: PaymentFailure,
}

/// Handler for recording payment failures.
///
/// Opens the grace window: the subscription moves to PaymentFailed but
/// keeps access until the ledger deadline passes. Notification
/// redelivery finds the open ledger row and does nothing.
pub struct RecordPaymentFailureHandler {
    store: Arc<dyn SubscriptionStore>,
    ledger: Arc<dyn FailureLedger>,
    notifier: Arc<dyn Notifier>,
    policy: BillingPolicy,
}

impl RecordPaymentFailureHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        ledger: Arc<dyn FailureLedger>,
        notifier: Arc<dyn Notifier>,
        policy: BillingPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            notifier,
            policy,
        }
    }

    pub async fn handle(
        &self,
        cmd: RecordPaymentFailureCommand,
    ) -> Result<RecordPaymentFailureResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_remote_id(&cmd.remote_id)
            .await?
            .ok_or_else(|| {
                SubscriptionError::infrastructure(format!(
                    "No subscription matches remote id {}",
                    cmd.remote_id
                ))
            })?;

        // Redelivered notification for a failure we already hold.
        if subscription.status == SubscriptionStatus::PaymentFailed {
            if let Some(failure) = self
                .ledger
                .find_unresolved_by_user(&subscription.user_id)
                .await?
            {
                return Ok(RecordPaymentFailureResult {
                    subscription,
                    failure,
                });
            }
        }

        let now = Timestamp::now();
        subscription.record_payment_failure(now)?;
        self.store.update(&subscription).await?;

        let failure = PaymentFailure::open(
            PaymentFailureId::new(),
            subscription.user_id.clone(),
            self.policy.grace_period_days,
            now,
        );
        self.ledger.insert(&failure).await?;

        tracing::warn!(
            user_id = %subscription.user_id,
            grace_ends_at = ?failure.grace_period_ends_at,
            "Payment failure recorded, grace period started"
        );
        if let Err(e) = self
            .notifier
            .notify(
                &subscription.user_id,
                LifecycleEvent::PaymentFailed {
                    grace_days: self.policy.grace_period_days,
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

        Ok(RecordPaymentFailureResult {
            subscription,
            failure,
        })
    }
}
