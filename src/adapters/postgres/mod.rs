//! PostgreSQL adapters for the persistence ports.

mod failure_ledger;
mod subscription_store;

pub use failure_ledger::PostgresFailureLedger;
pub use subscription_store::PostgresSubscriptionStore;
