//! Payment processor port for external recurring billing.
//!
//! Defines the contract for the remote processor that owns the actual
//! charging (e.g., PayPal). Implementations handle authentication, HTTP
//! transport, and mapping the processor's error vocabulary onto ours.
//!
//! # Design
//!
//! - **Processor agnostic**: Interface works with any billing provider
//! - **Terminal-state tolerant**: Cancelling an already-terminal remote
//!   resource reports `AlreadyTerminal` instead of failing, so local
//!   cleanup can proceed
//! - **Classified failures**: Every error is either transient (retry may
//!   succeed) or fatal (it will not)

use crate::domain::subscription::PlanType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for the remote payment processor.
///
/// All operations address remote resources by the processor's opaque
/// subscription id, never by our own ids.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    /// Create a remote subscription for the given plan.
    ///
    /// The resource starts unapproved; the user completes approval
    /// out-of-band via the returned URL.
    async fn create_subscription(
        &self,
        plan: PlanType,
        user_reference: &str,
    ) -> Result<CreatedSubscription, ProcessorError>;

    /// Fetch the current remote status of a subscription.
    async fn get_subscription_status(
        &self,
        remote_id: &str,
    ) -> Result<RemoteStatus, ProcessorError>;

    /// Switch the remote subscription to a different plan (revise).
    async fn revise_subscription(
        &self,
        remote_id: &str,
        new_plan: PlanType,
    ) -> Result<(), ProcessorError>;

    /// Pause billing on the remote subscription.
    async fn suspend_subscription(
        &self,
        remote_id: &str,
        reason: &str,
    ) -> Result<(), ProcessorError>;

    /// Resume billing on a suspended remote subscription.
    async fn activate_subscription(
        &self,
        remote_id: &str,
        reason: &str,
    ) -> Result<(), ProcessorError>;

    /// Cancel the remote subscription.
    ///
    /// Cancelling a resource the processor already considers finished is
    /// reported as `CancelOutcome::AlreadyTerminal`, not as an error.
    async fn cancel_subscription(
        &self,
        remote_id: &str,
        reason: &str,
    ) -> Result<CancelOutcome, ProcessorError>;
}

/// Result of creating a remote subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedSubscription {
    /// Processor's opaque subscription id.
    pub remote_id: String,

    /// URL where the user approves the subscription.
    pub approval_url: String,
}

/// Result of a remote cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The processor cancelled the resource.
    Cancelled,

    /// The resource was already cancelled or expired remotely. Treated
    /// as success by callers.
    AlreadyTerminal,
}

/// Remote subscription status as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Created, awaiting user approval.
    ApprovalPending,

    /// Approved but first charge not yet confirmed.
    Approved,

    /// Billing normally.
    Active,

    /// Billing paused.
    Suspended,

    /// Cancelled remotely.
    Cancelled,

    /// Finished remotely.
    Expired,

    /// Status string we do not recognize.
    Unknown,
}

impl RemoteStatus {
    /// Whether the processor will never bill this resource again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteStatus::Cancelled | RemoteStatus::Expired)
    }
}

/// Classification of a processor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorErrorKind {
    /// Network failure or timeout before a response arrived.
    Network,

    /// Rate limited (HTTP 429).
    RateLimited,

    /// Processor-side failure (HTTP 5xx).
    ServerError,

    /// Authentication with the processor failed.
    AuthenticationFailed,

    /// The processor definitively refused the request (other 4xx).
    Rejected,

    /// The remote resource does not exist.
    NotFound,
}

impl ProcessorErrorKind {
    /// Whether a retry of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProcessorErrorKind::Network
                | ProcessorErrorKind::RateLimited
                | ProcessorErrorKind::ServerError
        )
    }
}

/// Errors from processor operations.
#[derive(Debug, Clone)]
pub struct ProcessorError {
    /// Failure classification.
    pub kind: ProcessorErrorKind,

    /// Human-readable message.
    pub message: String,

    /// Processor's own error name, when one was returned.
    pub processor_code: Option<String>,
}

impl ProcessorError {
    pub fn new(kind: ProcessorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            processor_code: None,
        }
    }

    pub fn with_processor_code(mut self, code: impl Into<String>) -> Self {
        self.processor_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::Network, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::RateLimited, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::ServerError, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::AuthenticationFailed, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::Rejected, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(ProcessorErrorKind::NotFound, format!("{} not found", resource))
    }

    /// Whether a retry of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl std::fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.processor_code {
            Some(code) => write!(f, "{:?}: {} ({})", self.kind, self.message, code),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ProcessorError {}

impl From<ProcessorError> for crate::domain::subscription::SubscriptionError {
    fn from(err: ProcessorError) -> Self {
        use crate::domain::subscription::SubscriptionError;
        if err.is_retryable() {
            SubscriptionError::processor_transient(err.to_string())
        } else {
            SubscriptionError::processor_fatal(err.to_string())
        }
    }
}
