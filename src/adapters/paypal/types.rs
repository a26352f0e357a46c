//! PayPal REST API wire types.
//!
//! Serde representations of the request and response bodies used by the
//! billing subscriptions API. Only the fields we read are declared.

use serde::{Deserialize, Serialize};

/// Response from the OAuth2 token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    /// Lifetime in seconds from issuance.
    pub expires_in: i64,
}

/// Request body for creating a subscription.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSubscriptionBody {
    pub plan_id: String,
    pub custom_id: String,
    pub application_context: ApplicationContext,
}

/// Redirect URLs presented during out-of-band approval.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationContext {
    pub brand_name: String,
    pub return_url: String,
    pub cancel_url: String,
}

/// Response body for subscription create and get.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionResource {
    pub id: String,
    pub status: String,

    #[serde(default)]
    pub links: Vec<HateoasLink>,
}

impl SubscriptionResource {
    /// Returns the approval URL, if the processor included one.
    pub fn approval_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href.as_str())
    }
}

/// HATEOAS link entry.
#[derive(Debug, Clone, Deserialize)]
pub struct HateoasLink {
    pub href: String,
    pub rel: String,
}

/// Request body for revising a subscription's plan.
#[derive(Debug, Clone, Serialize)]
pub struct ReviseSubscriptionBody {
    pub plan_id: String,
}

/// Request body for suspend, activate, and cancel.
#[derive(Debug, Clone, Serialize)]
pub struct ReasonBody {
    pub reason: String,
}

/// Error response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

impl ErrorBody {
    /// Returns true if any detail carries the given issue code.
    pub fn has_issue(&self, issue: &str) -> bool {
        self.details.iter().any(|d| d.issue == issue)
    }
}

/// One entry of an error response's detail list.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub issue: String,

    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_resource_extracts_approval_link() {
        let json = r#"{
            "id": "I-ABC123",
            "status": "APPROVAL_PENDING",
            "links": [
                {"href": "https://api.paypal.com/v1/billing/subscriptions/I-ABC123", "rel": "self"},
                {"href": "https://www.paypal.com/webapps/billing/subscriptions?ba_token=BA-1", "rel": "approve"}
            ]
        }"#;

        let resource: SubscriptionResource = serde_json::from_str(json).unwrap();
        assert_eq!(resource.id, "I-ABC123");
        assert!(resource.approval_url().unwrap().contains("ba_token=BA-1"));
    }

    #[test]
    fn subscription_resource_without_links() {
        let json = r#"{"id": "I-ABC123", "status": "ACTIVE"}"#;
        let resource: SubscriptionResource = serde_json::from_str(json).unwrap();
        assert!(resource.approval_url().is_none());
    }

    #[test]
    fn error_body_detects_issue_codes() {
        let json = r#"{
            "name": "UNPROCESSABLE_ENTITY",
            "message": "The requested action could not be performed.",
            "details": [{"issue": "SUBSCRIPTION_STATUS_INVALID", "description": "Invalid subscription status."}]
        }"#;

        let body: ErrorBody = serde_json::from_str(json).unwrap();
        assert!(body.has_issue("SUBSCRIPTION_STATUS_INVALID"));
        assert!(!body.has_issue("CURRENCY_MISMATCH"));
    }

    #[test]
    fn error_body_tolerates_missing_fields() {
        let body: ErrorBody = serde_json::from_str("{}").unwrap();
        assert!(body.name.is_empty());
        assert!(body.details.is_empty());
    }
}
