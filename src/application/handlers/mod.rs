//! Command handlers organized by domain.

pub mod subscription;
