//! RetryPaymentHandler - Command handler for manual payment retries.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{
    FailureResolution, PaymentFailure, Subscription, SubscriptionError, SubscriptionStatus,
};
use crate::ports::{
    FailureLedger, LifecycleEvent, Notifier, ProcessorClient, RemoteStatus, SubscriptionStore,
};

/// Command for a user-initiated payment retry during the grace period.
#[derive(Debug, Clone)]
pub struct RetryPaymentCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct RetryPaymentResult {
    pub subscription: Subscription,
    pub failure: PaymentFailure,

    /// True when the processor confirmed a successful charge and the
    /// subscription returned to Active.
    pub recovered: bool,
}

/// Handler for manual payment retries.
///
/// The processor owns the actual charging; a retry asks it for the
/// current state rather than initiating a charge. A remote status of
/// ACTIVE means a charge went through since the failure, so the
/// subscription recovers with a fresh period. Anything else counts the
/// attempt and keeps the failure open.
pub struct RetryPaymentHandler {
    store: Arc<dyn SubscriptionStore>,
    ledger: Arc<dyn FailureLedger>,
    processor: Arc<dyn ProcessorClient>,
    notifier: Arc<dyn Notifier>,
}

impl RetryPaymentHandler {
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
        cmd: RetryPaymentCommand,
    ) -> Result<RetryPaymentResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_user_id(&cmd.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_user(cmd.user_id.clone()))?;

        if subscription.status != SubscriptionStatus::PaymentFailed {
            return Err(SubscriptionError::invalid_state(
                format!("{:?}", subscription.status),
                "retry payment for",
            ));
        }

        let mut failure = self
            .ledger
            .find_unresolved_by_user(&cmd.user_id)
            .await?
            .ok_or_else(|| {
                SubscriptionError::infrastructure(
                    "Subscription is in PaymentFailed without an open failure",
                )
            })?;

        let now = Timestamp::now();
        if failure.grace_expired(now) {
            return Err(SubscriptionError::validation(
                "grace_period",
                "The grace period has ended, a new subscription is required",
            ));
        }

        let remote_id = subscription
            .remote_subscription_id
            .clone()
            .ok_or_else(|| SubscriptionError::infrastructure("Subscription has no remote id"))?;
        let remote_status = self.processor.get_subscription_status(&remote_id).await?;

        if remote_status == RemoteStatus::Active {
            subscription.recover_payment(now)?;
            self.store.update(&subscription).await?;

            failure.resolve(FailureResolution::PaymentRecovered, now)?;
            self.ledger.update(&failure).await?;

            tracing::info!(
                user_id = %subscription.user_id,
                "Payment recovered, subscription active again"
            );
            if let Err(e) = self
                .notifier
                .notify(&subscription.user_id, LifecycleEvent::PaymentRecovered)
                .await
            {
                tracing::warn!(
                    user_id = %subscription.user_id,
                    error = %e,
                    "Failed to deliver lifecycle notification"
                );
            }

            return Ok(RetryPaymentResult {
                subscription,
                failure,
                recovered: true,
            });
        }

        failure.record_retry(now)?;
        self.ledger.update(&failure).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            retry_count = failure.retry_count,
            remote_status = ?remote_status,
            "Payment retry did not recover the subscription"
        );

        Ok(RetryPaymentResult {
            subscription,
            failure,
            recovered: false,
        })
    }
}
