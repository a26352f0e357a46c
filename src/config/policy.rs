//! Billing policy configuration
//!
//! Tunable business rules for the subscription lifecycle. Handlers read
//! these instead of hard-coding constants, so operations can adjust the
//! grace window or the change cutoff without a deploy.

use serde::Deserialize;

use super::error::ValidationError;

/// Billing policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BillingPolicy {
    /// Days of preserved access after a reported charge failure
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: u32,

    /// Hours before period end during which immediate plan changes are
    /// refused and must be scheduled instead
    #[serde(default = "default_plan_change_cutoff_hours")]
    pub plan_change_cutoff_hours: u32,

    /// Processor retries after the initial attempt for transient failures
    #[serde(default = "default_processor_max_retries")]
    pub processor_max_retries: u32,

    /// First retry backoff in milliseconds; doubles per retry
    #[serde(default = "default_processor_backoff_base_ms")]
    pub processor_backoff_base_ms: u64,
}

impl BillingPolicy {
    /// Validate policy configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.grace_period_days == 0 || self.grace_period_days > 30 {
            return Err(ValidationError::InvalidGracePeriod);
        }
        if self.plan_change_cutoff_hours > 168 {
            return Err(ValidationError::InvalidPlanChangeCutoff);
        }
        Ok(())
    }
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            grace_period_days: default_grace_period_days(),
            plan_change_cutoff_hours: default_plan_change_cutoff_hours(),
            processor_max_retries: default_processor_max_retries(),
            processor_backoff_base_ms: default_processor_backoff_base_ms(),
        }
    }
}

fn default_grace_period_days() -> u32 {
    4
}

fn default_plan_change_cutoff_hours() -> u32 {
    24
}

fn default_processor_max_retries() -> u32 {
    2
}

fn default_processor_backoff_base_ms() -> u64 {
    500
}
