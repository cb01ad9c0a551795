//! Invite issuance against the platform.
//!
//! Owns no state: it creates and revokes single-use invites for the managed
//! group and reports the outcome.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::GroupId;
use crate::domain::subscription::{InviteToken, SubscriptionError};
use crate::ports::MembershipPlatform;

use super::BestEffort;

/// Issues and revokes single-use invites for one group.
#[derive(Clone)]
pub struct InviteIssuer {
    platform: Arc<dyn MembershipPlatform>,
    group: GroupId,
    ttl: Duration,
}

impl InviteIssuer {
    pub fn new(platform: Arc<dyn MembershipPlatform>, group: GroupId, ttl: Duration) -> Self {
        Self {
            platform,
            group,
            ttl,
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Create a fresh single-use invite.
    pub async fn issue(&self) -> Result<InviteToken, SubscriptionError> {
        let token = self
            .platform
            .create_single_use_invite(self.group, self.ttl)
            .await?;
        Ok(token)
    }

    /// Revoke an invite. Failure is logged and reported, never raised.
    pub async fn revoke(&self, token: &InviteToken) -> BestEffort {
        BestEffort::attempt("revoke_invite", self.platform.revoke_invite(self.group, token)).await
    }

    /// Revoke `previous` (if any), then issue a new invite.
    pub async fn reissue(
        &self,
        previous: Option<&InviteToken>,
    ) -> Result<InviteToken, SubscriptionError> {
        if let Some(token) = previous {
            self.revoke(token).await;
        }
        self.issue().await
    }
}
