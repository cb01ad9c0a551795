//! Inbound events observed on the messaging platform.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{GroupId, PlatformUserId};

use super::InviteToken;

/// Someone asked to join a group through an invite link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequestReceived {
    pub group_id: GroupId,
    pub from_user_id: PlatformUserId,
    pub from_display_name: Option<String>,
    /// Absent when the request did not come through an invite link.
    pub used_invite_token: Option<InviteToken>,
}

/// A member left the group or was removed by someone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberLeftOrRemoved {
    pub group_id: GroupId,
    pub platform_user_id: PlatformUserId,
}
