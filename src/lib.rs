//! Fitstride - Fitness and Nutrition Tracking Backend
//!
//! This crate implements the subscription billing core: the lifecycle state
//! machine that keeps local subscription state consistent with the external
//! payment processor.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
