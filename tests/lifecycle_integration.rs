//! Integration tests for the subscription billing lifecycle.
//!
//! These tests drive complete user journeys through the command handlers
//! and the reconciler:
//! 1. Subscribe, approve out-of-band, activate
//! 2. Change plans immediately or at period end via the reconciler
//! 3. Fail a payment, retry during grace, expire after grace
//! 4. Cancel, keep access to period end, expire, resubscribe
//!
//! Uses the in-memory stores and a scriptable processor so the flows run
//! without external dependencies while still exercising the
//! compare-and-swap concurrency discipline.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use fitstride::adapters::memory::{InMemoryFailureLedger, InMemorySubscriptionStore};
use fitstride::application::handlers::subscription::{
    ApplyScheduledChangeHandler, CancelSubscriptionCommand, CancelSubscriptionHandler,
    ChangePlanNowCommand, ChangePlanNowHandler, CheckPremiumAccessHandler,
    CheckPremiumAccessQuery, ConfirmActivationCommand, ConfirmActivationHandler,
    ExpireGracePeriodHandler, ExpireLapsedCancellationHandler, RecordPaymentFailureCommand,
    RecordPaymentFailureHandler, RetryPaymentCommand, RetryPaymentHandler,
    SchedulePlanChangeCommand, SchedulePlanChangeHandler, SubscribeCommand, SubscribeHandler,
};
use fitstride::application::Reconciler;
use fitstride::config::{BillingPolicy, ReconcilerConfig};
use fitstride::domain::foundation::{Timestamp, UserId};
use fitstride::domain::subscription::{PlanType, SubscriptionError, SubscriptionStatus};
use fitstride::ports::{
    CancelOutcome, CreatedSubscription, FailureLedger, LifecycleEvent, Notifier, ProcessorClient,
    ProcessorError, RemoteStatus, SubscriptionStore,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Scriptable processor standing in for PayPal.
struct FakeProcessor {
    remote_status: Mutex<RemoteStatus>,
    counter: AtomicU32,
    cancelled: Mutex<Vec<String>>,
    revised: Mutex<Vec<(String, PlanType)>>,
}

impl FakeProcessor {
    fn new() -> Self {
        Self {
            remote_status: Mutex::new(RemoteStatus::Active),
            counter: AtomicU32::new(0),
            cancelled: Mutex::new(Vec::new()),
            revised: Mutex::new(Vec::new()),
        }
    }

    fn set_remote_status(&self, status: RemoteStatus) {
        *self.remote_status.lock().unwrap() = status;
    }
}

#[async_trait]
impl ProcessorClient for FakeProcessor {
    async fn create_subscription(
        &self,
        _plan: PlanType,
        _user_reference: &str,
    ) -> Result<CreatedSubscription, ProcessorError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let remote_id = format!("I-FAKE{}", n);
        Ok(CreatedSubscription {
            approval_url: format!("https://www.paypal.com/approve/{}", remote_id),
            remote_id,
        })
    }

    async fn get_subscription_status(
        &self,
        _remote_id: &str,
    ) -> Result<RemoteStatus, ProcessorError> {
        Ok(*self.remote_status.lock().unwrap())
    }

    async fn revise_subscription(
        &self,
        remote_id: &str,
        new_plan: PlanType,
    ) -> Result<(), ProcessorError> {
        self.revised
            .lock()
            .unwrap()
            .push((remote_id.to_string(), new_plan));
        Ok(())
    }

    async fn suspend_subscription(
        &self,
        _remote_id: &str,
        _reason: &str,
    ) -> Result<(), ProcessorError> {
        Ok(())
    }

    async fn activate_subscription(
        &self,
        _remote_id: &str,
        _reason: &str,
    ) -> Result<(), ProcessorError> {
        Ok(())
    }

    async fn cancel_subscription(
        &self,
        remote_id: &str,
        _reason: &str,
    ) -> Result<CancelOutcome, ProcessorError> {
        self.cancelled.lock().unwrap().push(remote_id.to_string());
        Ok(CancelOutcome::Cancelled)
    }
}

/// Notifier that records delivered events.
struct RecordingNotifier {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        _user_id: &UserId,
        event: LifecycleEvent,
    ) -> Result<(), SubscriptionError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Everything a lifecycle test needs, wired against in-memory adapters.
struct Harness {
    store: Arc<InMemorySubscriptionStore>,
    ledger: Arc<InMemoryFailureLedger>,
    processor: Arc<FakeProcessor>,
    notifier: Arc<RecordingNotifier>,
    subscribe: SubscribeHandler,
    confirm: ConfirmActivationHandler,
    change_now: ChangePlanNowHandler,
    schedule: SchedulePlanChangeHandler,
    cancel: CancelSubscriptionHandler,
    record_failure: RecordPaymentFailureHandler,
    retry: RetryPaymentHandler,
    check: CheckPremiumAccessHandler,
    reconciler: Reconciler,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let ledger = Arc::new(InMemoryFailureLedger::new());
        let processor = Arc::new(FakeProcessor::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let policy = BillingPolicy::default();

        let reconciler = Reconciler::new(
            store.clone(),
            ledger.clone(),
            ApplyScheduledChangeHandler::new(store.clone(), processor.clone(), notifier.clone()),
            ExpireGracePeriodHandler::new(
                store.clone(),
                ledger.clone(),
                processor.clone(),
                notifier.clone(),
            ),
            ExpireLapsedCancellationHandler::new(store.clone(), notifier.clone()),
            ReconcilerConfig::default(),
        );

        Self {
            subscribe: SubscribeHandler::new(store.clone(), processor.clone()),
            confirm: ConfirmActivationHandler::new(
                store.clone(),
                processor.clone(),
                notifier.clone(),
            ),
            change_now: ChangePlanNowHandler::new(
                store.clone(),
                processor.clone(),
                notifier.clone(),
                policy.clone(),
            ),
            schedule: SchedulePlanChangeHandler::new(store.clone(), notifier.clone()),
            cancel: CancelSubscriptionHandler::new(
                store.clone(),
                ledger.clone(),
                processor.clone(),
                notifier.clone(),
            ),
            record_failure: RecordPaymentFailureHandler::new(
                store.clone(),
                ledger.clone(),
                notifier.clone(),
                policy,
            ),
            retry: RetryPaymentHandler::new(
                store.clone(),
                ledger.clone(),
                processor.clone(),
                notifier.clone(),
            ),
            check: CheckPremiumAccessHandler::new(store.clone()),
            reconciler,
            store,
            ledger,
            processor,
            notifier,
        }
    }

    fn user(&self) -> UserId {
        UserId::new("user-integration").unwrap()
    }

    /// Subscribe and activate, returning the remote id.
    async fn activate(&self, plan: PlanType) -> String {
        let result = self
            .subscribe
            .handle(SubscribeCommand {
                user_id: self.user(),
                plan_type: plan,
            })
            .await
            .unwrap();
        self.confirm
            .handle(ConfirmActivationCommand {
                user_id: self.user(),
            })
            .await
            .unwrap();
        result.subscription.remote_subscription_id.unwrap()
    }

    /// Rewrites the stored row's schedule start to the past so the
    /// reconciler sees it as due without waiting a billing period.
    async fn backdate_schedule(&self) {
        let mut sub = self
            .store
            .find_by_user_id(&self.user())
            .await
            .unwrap()
            .unwrap();
        sub.next_plan_starts_at = Some(Timestamp::now().add_days(-1));
        self.store.update(&sub).await.unwrap();
    }

    /// Rewrites the stored row's expiry to the past.
    async fn backdate_expiry(&self) {
        let mut sub = self
            .store
            .find_by_user_id(&self.user())
            .await
            .unwrap()
            .unwrap();
        sub.expires_at = Some(Timestamp::now().add_days(-1));
        self.store.update(&sub).await.unwrap();
    }

    /// Rewrites the open failure's grace deadline to the past.
    async fn backdate_grace(&self) {
        let mut failure = self
            .ledger
            .find_unresolved_by_user(&self.user())
            .await
            .unwrap()
            .unwrap();
        failure.grace_period_ends_at = Timestamp::now().add_days(-1);
        self.ledger.update(&failure).await.unwrap();
    }

    async fn has_access(&self) -> bool {
        self.check
            .handle(CheckPremiumAccessQuery {
                user_id: self.user(),
            })
            .await
            .unwrap()
            .has_access
    }

    async fn status(&self) -> SubscriptionStatus {
        self.store
            .find_by_user_id(&self.user())
            .await
            .unwrap()
            .unwrap()
            .status
    }
}

// =============================================================================
// Activation and plan changes
// =============================================================================

#[tokio::test]
async fn subscribe_approve_activate_grants_access() {
    let h = Harness::new();

    let result = h
        .subscribe
        .handle(SubscribeCommand {
            user_id: h.user(),
            plan_type: PlanType::Monthly,
        })
        .await
        .unwrap();
    assert!(result.approval_url.contains("paypal"));
    assert!(!h.has_access().await);

    h.confirm
        .handle(ConfirmActivationCommand { user_id: h.user() })
        .await
        .unwrap();

    assert_eq!(h.status().await, SubscriptionStatus::Active);
    assert!(h.has_access().await);
}

#[tokio::test]
async fn immediate_upgrade_then_scheduled_downgrade() {
    let h = Harness::new();
    let remote_id = h.activate(PlanType::Monthly).await;

    // Upgrade now: revised remotely, same billing cycle.
    h.change_now
        .handle(ChangePlanNowCommand {
            user_id: h.user(),
            new_plan: PlanType::Yearly,
        })
        .await
        .unwrap();
    assert_eq!(
        h.processor.revised.lock().unwrap().as_slice(),
        &[(remote_id.clone(), PlanType::Yearly)]
    );

    // Downgrade later: parked on the row until period end.
    h.schedule
        .handle(SchedulePlanChangeCommand {
            user_id: h.user(),
            new_plan: PlanType::Monthly,
        })
        .await
        .unwrap();

    h.backdate_schedule().await;
    let report = h.reconciler.run_once().await.unwrap();
    assert_eq!(report.plan_changes_applied, 1);

    let sub = h.store.find_by_user_id(&h.user()).await.unwrap().unwrap();
    assert_eq!(sub.plan_type, PlanType::Monthly);
    assert!(sub.next_plan_type.is_none());
    assert_eq!(h.processor.revised.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn reconciler_rerun_changes_nothing() {
    let h = Harness::new();
    h.activate(PlanType::Monthly).await;
    h.schedule
        .handle(SchedulePlanChangeCommand {
            user_id: h.user(),
            new_plan: PlanType::Yearly,
        })
        .await
        .unwrap();
    h.backdate_schedule().await;

    let first = h.reconciler.run_once().await.unwrap();
    let second = h.reconciler.run_once().await.unwrap();

    assert_eq!(first.plan_changes_applied, 1);
    assert_eq!(second.plan_changes_applied, 0);
    assert_eq!(second.rows_failed, 0);
    assert_eq!(h.processor.revised.lock().unwrap().len(), 1);
}

// =============================================================================
// Payment failure, retry, grace expiry
// =============================================================================

#[tokio::test]
async fn payment_failure_retry_recovers() {
    let h = Harness::new();
    let remote_id = h.activate(PlanType::Monthly).await;

    h.record_failure
        .handle(RecordPaymentFailureCommand {
            remote_id: remote_id.clone(),
        })
        .await
        .unwrap();
    assert_eq!(h.status().await, SubscriptionStatus::PaymentFailed);
    // Grace window: access preserved.
    assert!(h.has_access().await);

    // The processor has charged successfully by the time the user retries.
    let result = h
        .retry
        .handle(RetryPaymentCommand { user_id: h.user() })
        .await
        .unwrap();

    assert!(result.recovered);
    assert_eq!(h.status().await, SubscriptionStatus::Active);
    assert!(h
        .ledger
        .find_unresolved_by_user(&h.user())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn failed_retry_then_grace_expiry_removes_access() {
    let h = Harness::new();
    let remote_id = h.activate(PlanType::Monthly).await;
    h.record_failure
        .handle(RecordPaymentFailureCommand {
            remote_id: remote_id.clone(),
        })
        .await
        .unwrap();

    // Charge still failing when the user retries.
    h.processor.set_remote_status(RemoteStatus::Suspended);
    let result = h
        .retry
        .handle(RetryPaymentCommand { user_id: h.user() })
        .await
        .unwrap();
    assert!(!result.recovered);
    assert_eq!(result.failure.retry_count, 1);

    h.backdate_grace().await;
    let report = h.reconciler.run_once().await.unwrap();
    assert_eq!(report.grace_periods_expired, 1);

    assert_eq!(h.status().await, SubscriptionStatus::Expired);
    assert!(!h.has_access().await);
    // The remote resource was cancelled on expiry.
    assert_eq!(
        h.processor.cancelled.lock().unwrap().as_slice(),
        &[remote_id]
    );
    assert!(h.notifier.events().contains(&LifecycleEvent::Expired));
}

#[tokio::test]
async fn duplicate_failure_notification_opens_one_ledger_row() {
    let h = Harness::new();
    let remote_id = h.activate(PlanType::Monthly).await;

    let first = h
        .record_failure
        .handle(RecordPaymentFailureCommand {
            remote_id: remote_id.clone(),
        })
        .await
        .unwrap();
    let second = h
        .record_failure
        .handle(RecordPaymentFailureCommand { remote_id })
        .await
        .unwrap();

    assert_eq!(first.failure.id, second.failure.id);
}

// =============================================================================
// Cancellation, expiry, resubscription
// =============================================================================

#[tokio::test]
async fn cancel_keeps_access_then_reconciler_expires() {
    let h = Harness::new();
    h.activate(PlanType::Monthly).await;

    h.cancel
        .handle(CancelSubscriptionCommand { user_id: h.user() })
        .await
        .unwrap();
    assert_eq!(h.status().await, SubscriptionStatus::Cancelled);
    // Paid through the period; access persists.
    assert!(h.has_access().await);

    h.backdate_expiry().await;
    let report = h.reconciler.run_once().await.unwrap();
    assert_eq!(report.cancellations_expired, 1);

    assert_eq!(h.status().await, SubscriptionStatus::Expired);
    assert!(!h.has_access().await);
}

#[tokio::test]
async fn double_cancel_is_idempotent() {
    let h = Harness::new();
    h.activate(PlanType::Monthly).await;

    h.cancel
        .handle(CancelSubscriptionCommand { user_id: h.user() })
        .await
        .unwrap();
    let second = h
        .cancel
        .handle(CancelSubscriptionCommand { user_id: h.user() })
        .await
        .unwrap();

    assert_eq!(second.subscription.status, SubscriptionStatus::Cancelled);
    assert_eq!(h.processor.cancelled.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn expired_user_resubscribes_with_fresh_remote() {
    let h = Harness::new();
    let old_remote = h.activate(PlanType::Monthly).await;

    h.cancel
        .handle(CancelSubscriptionCommand { user_id: h.user() })
        .await
        .unwrap();
    h.backdate_expiry().await;
    h.reconciler.run_once().await.unwrap();
    assert_eq!(h.status().await, SubscriptionStatus::Expired);

    let result = h
        .subscribe
        .handle(SubscribeCommand {
            user_id: h.user(),
            plan_type: PlanType::Yearly,
        })
        .await
        .unwrap();

    assert_eq!(result.subscription.status, SubscriptionStatus::Pending);
    assert_eq!(result.subscription.plan_type, PlanType::Yearly);
    assert_ne!(
        result.subscription.remote_subscription_id.as_deref(),
        Some(old_remote.as_str())
    );
    // Still one row for the user.
    assert_eq!(h.store.len(), 1);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn stale_writer_loses_with_conflict() {
    let h = Harness::new();
    h.activate(PlanType::Monthly).await;

    let fresh = h.store.find_by_user_id(&h.user()).await.unwrap().unwrap();
    let mut first = fresh.clone();
    let mut second = fresh;

    first.cancel(Timestamp::now()).unwrap();
    h.store.update(&first).await.unwrap();

    second.suspend(Timestamp::now()).unwrap();
    let result = h.store.update(&second).await;
    assert!(matches!(result, Err(SubscriptionError::Conflict { .. })));

    // The winner's state stands.
    assert_eq!(h.status().await, SubscriptionStatus::Cancelled);
}
