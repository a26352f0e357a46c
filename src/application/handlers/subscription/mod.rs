//! Subscription lifecycle command handlers.
//!
//! One handler per operation. Each handler loads fresh aggregate state,
//! calls the processor before committing locally where both sides are
//! involved, and persists through the version-checked store so
//! concurrent operations on the same user serialize cleanly.

mod apply_scheduled_change;
mod cancel;
mod cancel_scheduled_change;
mod change_plan_now;
mod check_premium;
mod confirm_activation;
mod expire_grace_period;
mod expire_lapsed_cancellation;
mod record_payment_failure;
mod retry_payment;
mod schedule_plan_change;
mod subscribe;
mod suspend;
mod reactivate;

#[cfg(test)]
pub mod mocks;

pub use apply_scheduled_change::{
    ApplyScheduledChangeCommand, ApplyScheduledChangeHandler, ApplyScheduledChangeResult,
};
pub use cancel::{CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult};
pub use cancel_scheduled_change::{
    CancelScheduledChangeCommand, CancelScheduledChangeHandler, CancelScheduledChangeResult,
};
pub use change_plan_now::{ChangePlanNowCommand, ChangePlanNowHandler, ChangePlanNowResult};
pub use check_premium::{CheckPremiumAccessHandler, CheckPremiumAccessQuery, PremiumAccess};
pub use confirm_activation::{
    ConfirmActivationCommand, ConfirmActivationHandler, ConfirmActivationResult,
};
pub use expire_grace_period::{
    ExpireGracePeriodCommand, ExpireGracePeriodHandler, ExpireGracePeriodResult,
};
pub use expire_lapsed_cancellation::{
    ExpireLapsedCancellationCommand, ExpireLapsedCancellationHandler,
    ExpireLapsedCancellationResult,
};
pub use record_payment_failure::{
    RecordPaymentFailureCommand, RecordPaymentFailureHandler, RecordPaymentFailureResult,
};
pub use retry_payment::{RetryPaymentCommand, RetryPaymentHandler, RetryPaymentResult};
pub use schedule_plan_change::{
    SchedulePlanChangeCommand, SchedulePlanChangeHandler, SchedulePlanChangeResult,
};
pub use subscribe::{SubscribeCommand, SubscribeHandler, SubscribeResult};
pub use suspend::{
    SuspendSubscriptionCommand, SuspendSubscriptionHandler, SuspendSubscriptionResult,
};
pub use reactivate::{
    ReactivateSubscriptionCommand, ReactivateSubscriptionHandler, ReactivateSubscriptionResult,
};
