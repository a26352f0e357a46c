//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment
//! variables using the `config` and `dotenvy` crates. Configuration is
//! loaded with the `FITSTRIDE` prefix and nested values use double
//! underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use fitstride::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod payment;
mod policy;
mod reconciler;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use policy::BillingPolicy;
pub use reconciler::ReconcilerConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Contains all configuration sections for the Fitstride billing service.
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Payment configuration (PayPal)
    pub payment: PaymentConfig,

    /// Billing policy (grace period, cutoffs, retry budget)
    #[serde(default)]
    pub policy: BillingPolicy,

    /// Scheduled reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `FITSTRIDE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `FITSTRIDE__DATABASE__URL=...` -> `database.url = ...`
    /// - `FITSTRIDE__POLICY__GRACE_PERIOD_DAYS=4` -> `policy.grace_period_days = 4`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required environment variables are missing
    /// or values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("FITSTRIDE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.payment.validate()?;
        self.policy.validate()?;
        self.reconciler.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var(
            "FITSTRIDE__DATABASE__URL",
            "postgresql://test@localhost/fitstride",
        );
        env::set_var("FITSTRIDE__PAYMENT__PAYPAL_CLIENT_ID", "client-id");
        env::set_var("FITSTRIDE__PAYMENT__PAYPAL_CLIENT_SECRET", "client-secret");
        env::set_var("FITSTRIDE__PAYMENT__PAYPAL_MONTHLY_PLAN_ID", "P-MONTHLY");
        env::set_var("FITSTRIDE__PAYMENT__PAYPAL_YEARLY_PLAN_ID", "P-YEARLY");
    }

    fn clear_env() {
        env::remove_var("FITSTRIDE__DATABASE__URL");
        env::remove_var("FITSTRIDE__PAYMENT__PAYPAL_CLIENT_ID");
        env::remove_var("FITSTRIDE__PAYMENT__PAYPAL_CLIENT_SECRET");
        env::remove_var("FITSTRIDE__PAYMENT__PAYPAL_MONTHLY_PLAN_ID");
        env::remove_var("FITSTRIDE__PAYMENT__PAYPAL_YEARLY_PLAN_ID");
        env::remove_var("FITSTRIDE__POLICY__GRACE_PERIOD_DAYS");
    }

    #[test]
    fn load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/fitstride");
        assert_eq!(config.payment.paypal_monthly_plan_id, "P-MONTHLY");
    }

    #[test]
    fn policy_defaults_apply() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.policy.grace_period_days, 4);
        assert_eq!(config.reconciler.batch_size, 100);
    }

    #[test]
    fn policy_override_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("FITSTRIDE__POLICY__GRACE_PERIOD_DAYS", "7");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.policy.grace_period_days, 7);
    }

    #[test]
    fn validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }
}
