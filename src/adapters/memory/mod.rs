//! In-memory adapters for development and testing.

mod failure_ledger;
mod subscription_store;

pub use failure_ledger::InMemoryFailureLedger;
pub use subscription_store::InMemorySubscriptionStore;
