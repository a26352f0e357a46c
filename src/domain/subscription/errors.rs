//! Subscription-specific error types.
//!
//! Errors raised by lifecycle operations, payment processing, and the
//! reconciler.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | AlreadyExists | 409 |
//! | Conflict | 409 |
//! | InvalidState | 409 |
//! | ValidationFailed | 400 |
//! | ProcessorTransient | 502 |
//! | ProcessorFatal | 402 |
//! | ResubscriptionRequired | 410 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, UserId};

/// Subscription-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Subscription was not found.
    NotFound(SubscriptionId),

    /// No subscription exists for this user.
    NotFoundForUser(UserId),

    /// User already has a live subscription.
    AlreadyExists(UserId),

    /// Concurrent update detected; the caller should reload and retry.
    Conflict {
        entity: String,
    },

    /// Invalid state for the requested operation.
    InvalidState {
        current: String,
        attempted: String,
    },

    /// Processor call failed in a way that may succeed on retry
    /// (network error, timeout, rate limit, 5xx).
    ProcessorTransient {
        reason: String,
    },

    /// Processor definitively refused the request (4xx other than 429).
    ProcessorFatal {
        reason: String,
    },

    /// The remote resource is unusable; the user must subscribe again.
    ResubscriptionRequired {
        reason: String,
    },

    /// Validation failed.
    ValidationFailed {
        field: String,
        message: String,
    },

    /// Infrastructure error.
    Infrastructure(String),
}

impl SubscriptionError {
    // Constructor functions for cleaner error creation

    pub fn not_found(id: SubscriptionId) -> Self {
        SubscriptionError::NotFound(id)
    }

    pub fn not_found_for_user(user_id: UserId) -> Self {
        SubscriptionError::NotFoundForUser(user_id)
    }

    pub fn already_exists(user_id: UserId) -> Self {
        SubscriptionError::AlreadyExists(user_id)
    }

    pub fn conflict(entity: impl Into<String>) -> Self {
        SubscriptionError::Conflict {
            entity: entity.into(),
        }
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        SubscriptionError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn processor_transient(reason: impl Into<String>) -> Self {
        SubscriptionError::ProcessorTransient {
            reason: reason.into(),
        }
    }

    pub fn processor_fatal(reason: impl Into<String>) -> Self {
        SubscriptionError::ProcessorFatal {
            reason: reason.into(),
        }
    }

    pub fn resubscription_required(reason: impl Into<String>) -> Self {
        SubscriptionError::ResubscriptionRequired {
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriptionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        SubscriptionError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::NotFound(_) | SubscriptionError::NotFoundForUser(_) => {
                ErrorCode::SubscriptionNotFound
            }
            SubscriptionError::AlreadyExists(_) => ErrorCode::SubscriptionExists,
            SubscriptionError::Conflict { .. } => ErrorCode::Conflict,
            SubscriptionError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            SubscriptionError::ProcessorTransient { .. } => ErrorCode::ProcessorTransient,
            SubscriptionError::ProcessorFatal { .. } => ErrorCode::ProcessorFatal,
            SubscriptionError::ResubscriptionRequired { .. } => ErrorCode::ResubscriptionRequired,
            SubscriptionError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            SubscriptionError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            SubscriptionError::NotFound(id) => format!("Subscription not found: {}", id),
            SubscriptionError::NotFoundForUser(user_id) => {
                format!("No subscription found for user: {}", user_id)
            }
            SubscriptionError::AlreadyExists(user_id) => {
                format!("User {} already has a live subscription", user_id)
            }
            SubscriptionError::Conflict { entity } => {
                format!("{} was modified concurrently, please retry", entity)
            }
            SubscriptionError::InvalidState { current, attempted } => {
                format!("Cannot {} subscription in {} state", attempted, current)
            }
            SubscriptionError::ProcessorTransient { reason } => {
                format!("Payment processor is temporarily unavailable: {}", reason)
            }
            SubscriptionError::ProcessorFatal { reason } => {
                format!("Payment processor rejected the request: {}", reason)
            }
            SubscriptionError::ResubscriptionRequired { reason } => {
                format!("Subscription must be recreated: {}", reason)
            }
            SubscriptionError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            SubscriptionError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubscriptionError::Infrastructure(_)
                | SubscriptionError::ProcessorTransient { .. }
                | SubscriptionError::Conflict { .. }
        )
    }
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SubscriptionError {}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => SubscriptionError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::InvalidStateTransition => SubscriptionError::InvalidState {
                current: "unknown".to_string(),
                attempted: err.message,
            },
            ErrorCode::Conflict => SubscriptionError::Conflict {
                entity: err.message,
            },
            ErrorCode::ProcessorTransient => SubscriptionError::ProcessorTransient {
                reason: err.message,
            },
            ErrorCode::ProcessorFatal => SubscriptionError::ProcessorFatal {
                reason: err.message,
            },
            ErrorCode::ResubscriptionRequired => SubscriptionError::ResubscriptionRequired {
                reason: err.message,
            },
            _ => SubscriptionError::Infrastructure(err.to_string()),
        }
    }
}

impl From<SubscriptionError> for DomainError {
    fn from(err: SubscriptionError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
