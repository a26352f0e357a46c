//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Billing Ports
//!
//! - `ProcessorClient` - Remote payment processor operations
//! - `SubscriptionStore` - Subscription aggregate persistence
//! - `FailureLedger` - Payment failure grace-period tracking
//! - `Notifier` - Best-effort user lifecycle notifications

mod failure_ledger;
mod notifier;
mod processor_client;
mod subscription_store;

pub use failure_ledger::FailureLedger;
pub use notifier::{LifecycleEvent, Notifier};
pub use processor_client::{
    CancelOutcome, CreatedSubscription, ProcessorClient, ProcessorError, ProcessorErrorKind,
    RemoteStatus,
};
pub use subscription_store::SubscriptionStore;
