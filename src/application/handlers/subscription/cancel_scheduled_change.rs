//! CancelScheduledChangeHandler - Command handler for dropping a schedule.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::SubscriptionStore;

/// Command to remove a pending scheduled plan change.
#[derive(Debug, Clone)]
pub struct CancelScheduledChangeCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct CancelScheduledChangeResult {
    pub subscription: Subscription,
}

/// Handler for cancelling scheduled plan changes. Purely local.
pub struct CancelScheduledChangeHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl CancelScheduledChangeHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        cmd: CancelScheduledChangeCommand,
    ) -> Result<CancelScheduledChangeResult, SubscriptionError> {
        let mut subscription = self
            .store
            .find_by_user_id(&cmd.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_user(cmd.user_id.clone()))?;

        subscription.cancel_scheduled_change(Timestamp::now())?;
        self.store.update(&subscription).await?;

        tracing::info!(
            user_id = %subscription.user_id,
            "Scheduled plan change removed"
        );

        Ok(CancelScheduledChangeResult { subscription })
    }
}
