//! User notification port.
//!
//! Lifecycle events the user should hear about. Delivery is best-effort;
//! handlers log and continue when a notification fails, because billing
//! state must never depend on notification delivery.

use crate::domain::foundation::UserId;
use crate::domain::subscription::{PlanType, SubscriptionError};
use async_trait::async_trait;

/// Lifecycle events delivered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Subscription activated after processor confirmation.
    Activated { plan: PlanType },

    /// Billed plan changed within the current cycle.
    PlanChanged { from: PlanType, to: PlanType },

    /// A plan change was scheduled for period end.
    PlanChangeScheduled { to: PlanType },

    /// A scheduled plan change took effect.
    ScheduledPlanApplied { to: PlanType },

    /// A charge failed; grace period is running.
    PaymentFailed { grace_days: u32 },

    /// A failed payment recovered.
    PaymentRecovered,

    /// Billing was suspended.
    Suspended,

    /// Cancellation was recorded; access continues until period end.
    Cancelled,

    /// The subscription ended.
    Expired,
}

/// Port for delivering lifecycle notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event to one user.
    async fn notify(&self, user_id: &UserId, event: LifecycleEvent)
        -> Result<(), SubscriptionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety test
    #[test]
    fn notifier_is_object_safe() {
        fn _accepts_dyn(_notifier: &dyn Notifier) {}
    }
}
