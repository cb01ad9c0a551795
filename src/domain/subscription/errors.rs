//! Subscription-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | InvalidInput | 400 |
//! | AlreadyMember | 409 |
//! | AlreadyPending | 409 |
//! | InvalidState | 409 |
//! | NotFound | 404 |
//! | IdentityNotResolvable | 422 |
//! | RateLimited | 429 |
//! | PlatformUnavailable | 502 |
//! | StoreUnavailable | 503 |

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors surfaced by the subscription lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Malformed identity or non-positive duration. Rejected before any
    /// side effect.
    InvalidInput { field: String, message: String },

    /// The subscriber is currently a member of the group.
    AlreadyMember(String),

    /// A live, unused invite is already outstanding.
    AlreadyPending(String),

    /// The record's state does not allow the requested operation.
    InvalidState { current: String, attempted: String },

    /// No record matches the given key.
    NotFound(String),

    /// The platform has no discoverable account for the contact.
    IdentityNotResolvable(String),

    /// Transient platform failure.
    PlatformUnavailable(String),

    /// The platform asked for a back-off of at least this many seconds.
    RateLimited { retry_after_secs: u64 },

    /// Persistence failure.
    StoreUnavailable(String),
}

impl SubscriptionError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriptionError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn already_member(identity: impl Into<String>) -> Self {
        SubscriptionError::AlreadyMember(identity.into())
    }

    pub fn already_pending(identity: impl Into<String>) -> Self {
        SubscriptionError::AlreadyPending(identity.into())
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        SubscriptionError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        SubscriptionError::NotFound(key.into())
    }

    pub fn identity_not_resolvable(identity: impl Into<String>) -> Self {
        SubscriptionError::IdentityNotResolvable(identity.into())
    }

    pub fn platform_unavailable(reason: impl Into<String>) -> Self {
        SubscriptionError::PlatformUnavailable(reason.into())
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        SubscriptionError::RateLimited { retry_after_secs }
    }

    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        SubscriptionError::StoreUnavailable(reason.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::InvalidInput { .. } => ErrorCode::ValidationFailed,
            SubscriptionError::AlreadyMember(_) => ErrorCode::AlreadyMember,
            SubscriptionError::AlreadyPending(_) => ErrorCode::AlreadyPending,
            SubscriptionError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            SubscriptionError::NotFound(_) => ErrorCode::SubscriberNotFound,
            SubscriptionError::IdentityNotResolvable(_) => ErrorCode::IdentityNotResolvable,
            SubscriptionError::PlatformUnavailable(_) => ErrorCode::PlatformUnavailable,
            SubscriptionError::RateLimited { .. } => ErrorCode::RateLimited,
            SubscriptionError::StoreUnavailable(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            SubscriptionError::InvalidInput { field, message } => {
                format!("Invalid value for '{}': {}", field, message)
            }
            SubscriptionError::AlreadyMember(identity) => {
                format!("{} is already a member of the group", identity)
            }
            SubscriptionError::AlreadyPending(identity) => {
                format!("{} already has an unused invite link", identity)
            }
            SubscriptionError::InvalidState { current, attempted } => {
                format!("Cannot {} subscription in {} state", attempted, current)
            }
            SubscriptionError::NotFound(key) => format!("Subscriber not found: {}", key),
            SubscriptionError::IdentityNotResolvable(identity) => format!(
                "No reachable account for {}; ask the subscriber to message the bot first",
                identity
            ),
            SubscriptionError::PlatformUnavailable(reason) => {
                format!("Messaging platform unavailable: {}", reason)
            }
            SubscriptionError::RateLimited { retry_after_secs } => {
                format!("Rate limited by platform; retry after {}s", retry_after_secs)
            }
            SubscriptionError::StoreUnavailable(reason) => {
                format!("Subscription store unavailable: {}", reason)
            }
        }
    }

    /// Returns true if the same call may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubscriptionError::PlatformUnavailable(_)
                | SubscriptionError::RateLimited { .. }
                | SubscriptionError::StoreUnavailable(_)
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
            ErrorCode::ValidationFailed => SubscriptionError::InvalidInput {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::SubscriberNotFound => SubscriptionError::NotFound(err.message),
            _ => SubscriptionError::StoreUnavailable(err.to_string()),
        }
    }
}

impl From<ValidationError> for SubscriptionError {
    fn from(err: ValidationError) -> Self {
        SubscriptionError::InvalidInput {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<SubscriptionError> for DomainError {
    fn from(err: SubscriptionError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
