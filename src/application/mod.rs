//! Application layer - command handlers and the reconciler.
//!
//! Handlers orchestrate domain logic through ports; the reconciler
//! drives every deadline-based transition on a schedule.

pub mod handlers;
pub mod reconciler;

pub use reconciler::{Reconciler, SweepReport};
