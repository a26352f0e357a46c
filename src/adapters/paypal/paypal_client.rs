//! PayPal billing processor adapter.
//!
//! Implements the `ProcessorClient` trait against the PayPal REST
//! billing subscriptions API.
//!
//! # Behavior
//!
//! - OAuth2 client-credentials tokens are cached and refreshed shortly
//!   before expiry; a 401 triggers exactly one re-auth per request
//! - Network failures, timeouts, 429 and 5xx responses are retried a
//!   bounded number of times with exponential backoff
//! - Cancelling a remote resource PayPal already considers finished
//!   (UNPROCESSABLE_ENTITY / SUBSCRIPTION_STATUS_INVALID) is reported as
//!   `CancelOutcome::AlreadyTerminal`, not as an error
//!
//! # Configuration
//!
//! ```ignore
//! let config = PaypalConfig::new(client_id, client_secret)
//!     .with_plan_ids("P-MONTHLY", "P-YEARLY");
//! let client = PaypalProcessorClient::new(config);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

use crate::domain::subscription::PlanType;
use crate::ports::{
    CancelOutcome, CreatedSubscription, ProcessorClient, ProcessorError, RemoteStatus,
};

use super::types::{
    ApplicationContext, CreateSubscriptionBody, ErrorBody, ReasonBody, ReviseSubscriptionBody,
    SubscriptionResource, TokenResponse,
};

/// Refresh the cached token this many seconds before it actually expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// PayPal API configuration.
#[derive(Clone)]
pub struct PaypalConfig {
    /// OAuth2 client id.
    client_id: String,

    /// OAuth2 client secret.
    client_secret: SecretString,

    /// Base URL for the PayPal API (default: https://api-m.paypal.com).
    api_base_url: String,

    /// Brand name shown on the approval page.
    brand_name: String,

    /// URL the user returns to after approving.
    return_url: String,

    /// URL the user returns to after abandoning approval.
    cancel_url: String,

    /// PayPal billing plan id for the monthly plan.
    monthly_plan_id: String,

    /// PayPal billing plan id for the yearly plan.
    yearly_plan_id: String,

    /// Retries after the initial attempt for transient failures.
    max_retries: u32,

    /// First backoff delay; doubles per retry.
    backoff_base_ms: u64,

    /// Timeout for read requests.
    read_timeout: Duration,

    /// Timeout for state-changing requests.
    write_timeout: Duration,
}

impl PaypalConfig {
    /// Create a new PayPal configuration.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            api_base_url: "https://api-m.paypal.com".to_string(),
            brand_name: "Fitstride".to_string(),
            return_url: "https://app.fitstride.com/billing/return".to_string(),
            cancel_url: "https://app.fitstride.com/billing/cancel".to_string(),
            monthly_plan_id: String::new(),
            yearly_plan_id: String::new(),
            max_retries: 2,
            backoff_base_ms: 500,
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(30),
        }
    }

    /// Set a custom API base URL (sandbox or testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the billing plan ids for the paid plans.
    pub fn with_plan_ids(
        mut self,
        monthly: impl Into<String>,
        yearly: impl Into<String>,
    ) -> Self {
        self.monthly_plan_id = monthly.into();
        self.yearly_plan_id = yearly.into();
        self
    }

    /// Set the approval redirect URLs.
    pub fn with_redirect_urls(
        mut self,
        return_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        self.return_url = return_url.into();
        self.cancel_url = cancel_url.into();
        self
    }

    /// Set the retry budget for transient failures.
    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// PayPal processor adapter.
///
/// Implements `ProcessorClient` against the billing subscriptions API.
pub struct PaypalProcessorClient {
    config: PaypalConfig,
    http_client: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl PaypalProcessorClient {
    /// Create a new PayPal adapter with the given configuration.
    pub fn new(config: PaypalConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            token: RwLock::new(None),
        }
    }

    fn plan_id(&self, plan: PlanType) -> Result<&str, ProcessorError> {
        match plan {
            PlanType::Monthly => Ok(&self.config.monthly_plan_id),
            PlanType::Yearly => Ok(&self.config.yearly_plan_id),
            PlanType::Free => Err(ProcessorError::rejected(
                "Free plan has no PayPal billing plan",
            )),
        }
    }

    /// Returns a valid access token, fetching a fresh one if needed.
    async fn access_token(&self) -> Result<String, ProcessorError> {
        {
            let guard = self.token.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.is_valid(Utc::now()) {
                    return Ok(cached.access_token.clone());
                }
            }
        }
        self.fetch_token().await
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    async fn fetch_token(&self) -> Result<String, ProcessorError> {
        let url = format!("{}/v1/oauth2/token", self.config.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .timeout(self.config.read_timeout)
            .send()
            .await
            .map_err(|e| ProcessorError::network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, error = %error_text, "PayPal token request failed");
            return Err(ProcessorError::authentication(format!(
                "Token request failed with {}",
                status
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProcessorError::authentication(format!("Invalid token response: {}", e)))?;

        let access_token = token.access_token.clone();
        *self.token.write().await = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
        });

        Ok(access_token)
    }

    /// Sends a request, retrying transient failures and re-authenticating
    /// once on 401. The returned response is never 401 unless re-auth
    /// already happened.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<reqwest::Response, ProcessorError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let mut attempt: u32 = 0;
        let mut reauthed = false;

        loop {
            let token = self.access_token().await?;
            let mut request = self
                .http_client
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .timeout(timeout);
            if let Some(json) = &body {
                request = request.json(json);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::UNAUTHORIZED && !reauthed {
                        reauthed = true;
                        self.invalidate_token().await;
                        continue;
                    }

                    if (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                        && attempt < self.config.max_retries
                    {
                        self.backoff(attempt).await;
                        attempt += 1;
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) if attempt < self.config.max_retries => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        "PayPal request failed, retrying"
                    );
                    self.backoff(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(ProcessorError::network(e.to_string())),
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let delay = self.config.backoff_base_ms.saturating_mul(1 << attempt);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    /// Reads the error body and classifies the failure.
    async fn error_from_response(response: reqwest::Response) -> ProcessorError {
        let status = response.status();
        let body: ErrorBody = response.json().await.unwrap_or_else(|_| ErrorBody {
            name: String::new(),
            message: String::new(),
            details: Vec::new(),
        });
        classify_error(status, &body)
    }
}

/// Maps an HTTP failure onto the processor error taxonomy.
fn classify_error(status: StatusCode, body: &ErrorBody) -> ProcessorError {
    let message = if body.message.is_empty() {
        format!("PayPal returned {}", status)
    } else {
        body.message.clone()
    };

    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => ProcessorError::rate_limited(message),
        StatusCode::UNAUTHORIZED => ProcessorError::authentication(message),
        StatusCode::NOT_FOUND => ProcessorError::not_found("Remote subscription"),
        s if s.is_server_error() => ProcessorError::server_error(message),
        _ => ProcessorError::rejected(message),
    };

    if body.name.is_empty() {
        error
    } else {
        error.with_processor_code(&body.name)
    }
}

/// Maps PayPal's status vocabulary onto ours.
fn map_remote_status(status: &str) -> RemoteStatus {
    match status {
        "APPROVAL_PENDING" => RemoteStatus::ApprovalPending,
        "APPROVED" => RemoteStatus::Approved,
        "ACTIVE" => RemoteStatus::Active,
        "SUSPENDED" => RemoteStatus::Suspended,
        "CANCELLED" => RemoteStatus::Cancelled,
        "EXPIRED" => RemoteStatus::Expired,
        other => {
            tracing::warn!(status = other, "Unrecognized PayPal subscription status");
            RemoteStatus::Unknown
        }
    }
}

/// Whether a failed cancel means the resource is already finished remotely.
fn is_already_terminal(status: StatusCode, body: &ErrorBody) -> bool {
    if status == StatusCode::NOT_FOUND {
        return true;
    }
    status == StatusCode::UNPROCESSABLE_ENTITY
        && (body.has_issue("SUBSCRIPTION_STATUS_INVALID") || body.name == "UNPROCESSABLE_ENTITY")
}

#[async_trait]
impl ProcessorClient for PaypalProcessorClient {
    async fn create_subscription(
        &self,
        plan: PlanType,
        user_reference: &str,
    ) -> Result<CreatedSubscription, ProcessorError> {
        let body = CreateSubscriptionBody {
            plan_id: self.plan_id(plan)?.to_string(),
            custom_id: user_reference.to_string(),
            application_context: ApplicationContext {
                brand_name: self.config.brand_name.clone(),
                return_url: self.config.return_url.clone(),
                cancel_url: self.config.cancel_url.clone(),
            },
        };

        let response = self
            .send(
                Method::POST,
                "/v1/billing/subscriptions",
                Some(serde_json::to_value(&body).map_err(|e| {
                    ProcessorError::rejected(format!("Failed to encode request: {}", e))
                })?),
                self.config.write_timeout,
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let resource: SubscriptionResource = response.json().await.map_err(|e| {
            ProcessorError::server_error(format!("Failed to parse PayPal response: {}", e))
        })?;

        let approval_url = resource
            .approval_url()
            .ok_or_else(|| {
                ProcessorError::server_error("PayPal response is missing the approval link")
            })?
            .to_string();

        tracing::info!(
            remote_id = %resource.id,
            plan = %plan,
            "Created remote subscription"
        );

        Ok(CreatedSubscription {
            remote_id: resource.id,
            approval_url,
        })
    }

    async fn get_subscription_status(
        &self,
        remote_id: &str,
    ) -> Result<RemoteStatus, ProcessorError> {
        let response = self
            .send(
                Method::GET,
                &format!("/v1/billing/subscriptions/{}", remote_id),
                None,
                self.config.read_timeout,
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let resource: SubscriptionResource = response.json().await.map_err(|e| {
            ProcessorError::server_error(format!("Failed to parse PayPal response: {}", e))
        })?;

        Ok(map_remote_status(&resource.status))
    }

    async fn revise_subscription(
        &self,
        remote_id: &str,
        new_plan: PlanType,
    ) -> Result<(), ProcessorError> {
        let body = ReviseSubscriptionBody {
            plan_id: self.plan_id(new_plan)?.to_string(),
        };

        let response = self
            .send(
                Method::POST,
                &format!("/v1/billing/subscriptions/{}/revise", remote_id),
                Some(serde_json::to_value(&body).map_err(|e| {
                    ProcessorError::rejected(format!("Failed to encode request: {}", e))
                })?),
                self.config.write_timeout,
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }

    async fn suspend_subscription(
        &self,
        remote_id: &str,
        reason: &str,
    ) -> Result<(), ProcessorError> {
        let body = ReasonBody {
            reason: reason.to_string(),
        };

        let response = self
            .send(
                Method::POST,
                &format!("/v1/billing/subscriptions/{}/suspend", remote_id),
                Some(serde_json::to_value(&body).map_err(|e| {
                    ProcessorError::rejected(format!("Failed to encode request: {}", e))
                })?),
                self.config.write_timeout,
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }

    async fn activate_subscription(
        &self,
        remote_id: &str,
        reason: &str,
    ) -> Result<(), ProcessorError> {
        let body = ReasonBody {
            reason: reason.to_string(),
        };

        let response = self
            .send(
                Method::POST,
                &format!("/v1/billing/subscriptions/{}/activate", remote_id),
                Some(serde_json::to_value(&body).map_err(|e| {
                    ProcessorError::rejected(format!("Failed to encode request: {}", e))
                })?),
                self.config.write_timeout,
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }

    async fn cancel_subscription(
        &self,
        remote_id: &str,
        reason: &str,
    ) -> Result<CancelOutcome, ProcessorError> {
        let body = ReasonBody {
            reason: reason.to_string(),
        };

        let response = self
            .send(
                Method::POST,
                &format!("/v1/billing/subscriptions/{}/cancel", remote_id),
                Some(serde_json::to_value(&body).map_err(|e| {
                    ProcessorError::rejected(format!("Failed to encode request: {}", e))
                })?),
                self.config.write_timeout,
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(CancelOutcome::Cancelled);
        }

        let error_body: ErrorBody = response.json().await.unwrap_or_else(|_| ErrorBody {
            name: String::new(),
            message: String::new(),
            details: Vec::new(),
        });

        if is_already_terminal(status, &error_body) {
            tracing::info!(
                remote_id = %remote_id,
                "Remote subscription already finished, treating cancel as success"
            );
            return Ok(CancelOutcome::AlreadyTerminal);
        }

        Err(classify_error(status, &error_body))
    }
}
