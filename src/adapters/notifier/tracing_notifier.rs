//! Tracing-backed notifier implementation.
//!
//! Emits lifecycle notifications as structured log events. Stands in for
//! an email or push delivery channel; swapping the channel means swapping
//! this adapter, not the handlers.

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::domain::subscription::SubscriptionError;
use crate::ports::{LifecycleEvent, Notifier};

/// Notifier that logs lifecycle events via `tracing`.
#[derive(Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        user_id: &UserId,
        event: LifecycleEvent,
    ) -> Result<(), SubscriptionError> {
        tracing::info!(
            user_id = %user_id,
            event = ?event,
            "Subscription lifecycle notification"
        );
        Ok(())
    }
}
