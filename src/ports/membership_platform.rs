//! Membership platform port.
//!
//! The capabilities the subscription core needs from the messaging platform:
//! invite management, join-request arbitration, eviction, contact resolution
//! and direct messages. Every call is a single fallible network operation
//! issued with a timeout by the adapter.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::foundation::{GroupId, PlatformUserId};
use crate::domain::subscription::{InviteToken, PhoneNumber, SubscriptionError};

/// Errors returned by platform calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Flood-wait: the same call must not be retried before `retry_after`.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Network failure or 5xx.
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    /// The platform refused the call.
    #[error("platform rejected request: {description}")]
    Rejected { description: String },

    /// The addressed user, chat or invite does not exist.
    #[error("not found")]
    NotFound,

    #[error("platform request timed out")]
    Timeout,
}

impl PlatformError {
    pub fn rejected(description: impl Into<String>) -> Self {
        PlatformError::Rejected {
            description: description.into(),
        }
    }
}

impl From<PlatformError> for SubscriptionError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::RateLimited { retry_after } => {
                // Round up so callers never retry early.
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                SubscriptionError::rate_limited(secs)
            }
            other => SubscriptionError::platform_unavailable(other.to_string()),
        }
    }
}

/// Platform account found for a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub user_id: PlatformUserId,
    pub display_name: Option<String>,
}

/// Port for the external membership platform.
#[async_trait]
pub trait MembershipPlatform: Send + Sync {
    /// Create an invite that admits exactly one join and expires after `ttl`.
    async fn create_single_use_invite(
        &self,
        group: GroupId,
        ttl: Duration,
    ) -> Result<InviteToken, PlatformError>;

    /// Revoke an invite. Revoking an already revoked or expired invite is
    /// not an error.
    async fn revoke_invite(&self, group: GroupId, token: &InviteToken)
        -> Result<(), PlatformError>;

    async fn approve_join_request(
        &self,
        group: GroupId,
        user: PlatformUserId,
    ) -> Result<(), PlatformError>;

    async fn decline_join_request(
        &self,
        group: GroupId,
        user: PlatformUserId,
    ) -> Result<(), PlatformError>;

    /// Evict a member while still allowing re-entry through a fresh invite.
    ///
    /// Removing someone who is not in the group is not an error.
    async fn remove_member(&self, group: GroupId, user: PlatformUserId)
        -> Result<(), PlatformError>;

    /// Look up the platform account behind a phone number.
    ///
    /// Returns `None` when no reachable account exists.
    async fn resolve_identity(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<ResolvedIdentity>, PlatformError>;

    /// Send a private message to a user.
    async fn send_direct_message(
        &self,
        user: PlatformUserId,
        text: &str,
    ) -> Result<(), PlatformError>;

    /// Post a message into a group or channel chat.
    async fn post_to_chat(&self, chat: GroupId, text: &str) -> Result<(), PlatformError>;
}
