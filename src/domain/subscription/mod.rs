//! Subscription domain module.
//!
//! Handles the billing lifecycle: subscribing, plan changes, suspension,
//! cancellation, payment failures, and expiry.
//!
//! # Module Structure
//!
//! - `aggregate` - Subscription aggregate entity
//! - `status` - SubscriptionStatus state machine
//! - `plan` - PlanType billing plans and change policy
//! - `payment_failure` - PaymentFailure grace-period ledger entity
//! - `errors` - SubscriptionError taxonomy

mod aggregate;
mod errors;
mod payment_failure;
mod plan;
mod status;

pub use aggregate::Subscription;
pub use errors::SubscriptionError;
pub use payment_failure::{FailureResolution, PaymentFailure};
pub use plan::PlanType;
pub use status::SubscriptionStatus;
