//! Reconciler configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Scheduled reconciler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Seconds between reconciliation sweeps
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum rows processed per sweep and per scan
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

impl ReconcilerConfig {
    /// Get the sweep interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate reconciler configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidReconcilerInterval);
        }
        if self.batch_size < 1 || self.batch_size > 1000 {
            return Err(ValidationError::InvalidReconcilerBatchSize);
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_batch_size() -> i64 {
    100
}
