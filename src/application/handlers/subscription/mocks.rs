//! Shared mock ports for handler tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{PlanType, SubscriptionError};
use crate::ports::{
    CancelOutcome, CreatedSubscription, LifecycleEvent, Notifier, ProcessorClient, ProcessorError,
    RemoteStatus,
};

/// Scriptable processor mock recording every call.
pub struct MockProcessorClient {
    pub created: Mutex<Vec<(PlanType, String)>>,
    pub revised: Mutex<Vec<(String, PlanType)>>,
    pub suspended: Mutex<Vec<String>>,
    pub activated: Mutex<Vec<String>>,
    pub cancelled: Mutex<Vec<String>>,
    remote_status: Mutex<RemoteStatus>,
    cancel_outcome: Mutex<CancelOutcome>,
    fail_with: Mutex<Option<ProcessorError>>,
    counter: AtomicU32,
}

impl MockProcessorClient {
    pub fn new() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            revised: Mutex::new(Vec::new()),
            suspended: Mutex::new(Vec::new()),
            activated: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            remote_status: Mutex::new(RemoteStatus::Active),
            cancel_outcome: Mutex::new(CancelOutcome::Cancelled),
            fail_with: Mutex::new(None),
            counter: AtomicU32::new(0),
        }
    }

    /// Makes every subsequent call fail with the given error.
    pub fn failing(error: ProcessorError) -> Self {
        let mock = Self::new();
        *mock.fail_with.lock().unwrap() = Some(error);
        mock
    }

    pub fn set_remote_status(&self, status: RemoteStatus) {
        *self.remote_status.lock().unwrap() = status;
    }

    pub fn set_cancel_outcome(&self, outcome: CancelOutcome) {
        *self.cancel_outcome.lock().unwrap() = outcome;
    }

    pub fn set_failure(&self, error: Option<ProcessorError>) {
        *self.fail_with.lock().unwrap() = error;
    }

    fn check_failure(&self) -> Result<(), ProcessorError> {
        match self.fail_with.lock().unwrap().as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProcessorClient for MockProcessorClient {
    async fn create_subscription(
        &self,
        plan: PlanType,
        user_reference: &str,
    ) -> Result<CreatedSubscription, ProcessorError> {
        self.check_failure()?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let remote_id = format!("I-MOCK{}", n);
        self.created
            .lock()
            .unwrap()
            .push((plan, user_reference.to_string()));
        Ok(CreatedSubscription {
            remote_id: remote_id.clone(),
            approval_url: format!("https://approval.example/{}", remote_id),
        })
    }

    async fn get_subscription_status(
        &self,
        _remote_id: &str,
    ) -> Result<RemoteStatus, ProcessorError> {
        self.check_failure()?;
        Ok(*self.remote_status.lock().unwrap())
    }

    async fn revise_subscription(
        &self,
        remote_id: &str,
        new_plan: PlanType,
    ) -> Result<(), ProcessorError> {
        self.check_failure()?;
        self.revised
            .lock()
            .unwrap()
            .push((remote_id.to_string(), new_plan));
        Ok(())
    }

    async fn suspend_subscription(
        &self,
        remote_id: &str,
        _reason: &str,
    ) -> Result<(), ProcessorError> {
        self.check_failure()?;
        self.suspended.lock().unwrap().push(remote_id.to_string());
        Ok(())
    }

    async fn activate_subscription(
        &self,
        remote_id: &str,
        _reason: &str,
    ) -> Result<(), ProcessorError> {
        self.check_failure()?;
        self.activated.lock().unwrap().push(remote_id.to_string());
        Ok(())
    }

    async fn cancel_subscription(
        &self,
        remote_id: &str,
        _reason: &str,
    ) -> Result<CancelOutcome, ProcessorError> {
        self.check_failure()?;
        self.cancelled.lock().unwrap().push(remote_id.to_string());
        Ok(*self.cancel_outcome.lock().unwrap())
    }
}

/// Notifier mock collecting delivered events.
pub struct CollectingNotifier {
    events: Mutex<Vec<(UserId, LifecycleEvent)>>,
    fail: bool,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A notifier whose deliveries always fail. Handlers must tolerate it.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<(UserId, LifecycleEvent)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(
        &self,
        user_id: &UserId,
        event: LifecycleEvent,
    ) -> Result<(), SubscriptionError> {
        if self.fail {
            return Err(SubscriptionError::infrastructure(
                "Simulated notification failure",
            ));
        }
        self.events.lock().unwrap().push((user_id.clone(), event));
        Ok(())
    }
}
