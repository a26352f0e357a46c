//! Payment configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Payment configuration (PayPal)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// PayPal OAuth2 client id
    pub paypal_client_id: String,

    /// PayPal OAuth2 client secret
    pub paypal_client_secret: String,

    /// PayPal API base URL
    #[serde(default = "default_base_url")]
    pub paypal_base_url: String,

    /// PayPal billing plan id for the monthly plan
    pub paypal_monthly_plan_id: String,

    /// PayPal billing plan id for the yearly plan
    pub paypal_yearly_plan_id: String,

    /// URL the user returns to after approving a subscription
    #[serde(default = "default_return_url")]
    pub return_url: String,

    /// URL the user returns to after abandoning approval
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,
}

impl PaymentConfig {
    /// Check if pointed at the PayPal sandbox
    pub fn is_sandbox(&self) -> bool {
        self.paypal_base_url.contains("sandbox")
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.paypal_client_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_CLIENT_ID"));
        }
        if self.paypal_client_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_CLIENT_SECRET"));
        }
        if self.paypal_monthly_plan_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_MONTHLY_PLAN_ID"));
        }
        if self.paypal_yearly_plan_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_YEARLY_PLAN_ID"));
        }
        if !self.paypal_base_url.starts_with("https://") {
            return Err(ValidationError::InvalidPaypalBaseUrl);
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            paypal_client_id: String::new(),
            paypal_client_secret: String::new(),
            paypal_base_url: default_base_url(),
            paypal_monthly_plan_id: String::new(),
            paypal_yearly_plan_id: String::new(),
            return_url: default_return_url(),
            cancel_url: default_cancel_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://api-m.paypal.com".to_string()
}

fn default_return_url() -> String {
    "https://app.fitstride.com/billing/return".to_string()
}

fn default_cancel_url() -> String {
    "https://app.fitstride.com/billing/cancel".to_string()
}
