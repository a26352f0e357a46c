//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid PayPal API base URL")]
    InvalidPaypalBaseUrl,

    #[error("Grace period must be between 1 and 30 days")]
    InvalidGracePeriod,

    #[error("Plan change cutoff must be between 0 and 168 hours")]
    InvalidPlanChangeCutoff,

    #[error("Reconciler interval must be at least 1 second")]
    InvalidReconcilerInterval,

    #[error("Reconciler batch size must be between 1 and 1000")]
    InvalidReconcilerBatchSize,
}
