//! Adapters - Implementations of ports for external systems.
//!
//! Each submodule adapts one external dependency to the port contracts:
//!
//! - `paypal` - PayPal REST billing API processor client
//! - `postgres` - PostgreSQL persistence for subscriptions and failures
//! - `memory` - In-memory persistence for development and testing
//! - `notifier` - Lifecycle notification delivery

pub mod memory;
pub mod notifier;
pub mod paypal;
pub mod postgres;
