//! Inbound Telegram updates.
//!
//! Only the fields the service reads are modelled. Updates translate into
//! the platform-neutral events consumed by the application layer.

use serde::Deserialize;

use crate::domain::foundation::{GroupId, PlatformUserId};
use crate::domain::subscription::{InviteToken, JoinRequestReceived, MemberLeftOrRemoved};

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub chat_join_request: Option<ChatJoinRequest>,
    pub chat_member: Option<ChatMemberUpdated>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl User {
    fn display_name(&self) -> Option<String> {
        let full = match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        };
        let full = full.trim();
        if !full.is_empty() {
            Some(full.to_string())
        } else {
            self.username.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteLink {
    pub invite_link: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: Chat,
    pub from: User,
    pub invite_link: Option<InviteLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub new_chat_member: ChatMember,
}

/// Platform event carried by an update.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    JoinRequest(JoinRequestReceived),
    MemberLeft(MemberLeftOrRemoved),
}

impl Update {
    /// The event this update carries, if the service acts on it.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(request) = self.chat_join_request {
            return Some(InboundEvent::JoinRequest(JoinRequestReceived {
                group_id: GroupId::new(request.chat.id),
                from_user_id: PlatformUserId::new(request.from.id),
                from_display_name: request.from.display_name(),
                used_invite_token: request
                    .invite_link
                    .and_then(|link| InviteToken::new(link.invite_link).ok()),
            }));
        }

        let member = self.chat_member?;
        match member.new_chat_member.status.as_str() {
            "left" | "kicked" => Some(InboundEvent::MemberLeft(MemberLeftOrRemoved {
                group_id: GroupId::new(member.chat.id),
                platform_user_id: PlatformUserId::new(member.new_chat_member.user.id),
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Update {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn join_request_carries_invite_and_name() {
        let update = parse(
            r#"{
                "update_id": 1,
                "chat_join_request": {
                    "chat": {"id": -1001234567890, "type": "supergroup"},
                    "from": {"id": 42, "is_bot": false, "first_name": "Alice", "last_name": "Smith"},
                    "user_chat_id": 42,
                    "date": 1700000000,
                    "invite_link": {"invite_link": "https://t.me/+abc", "creates_join_request": true}
                }
            }"#,
        );

        let Some(InboundEvent::JoinRequest(event)) = update.into_event() else {
            panic!("expected join request");
        };
        assert_eq!(event.group_id, GroupId::new(-1001234567890));
        assert_eq!(event.from_user_id, PlatformUserId::new(42));
        assert_eq!(event.from_display_name.as_deref(), Some("Alice Smith"));
        assert_eq!(event.used_invite_token.unwrap().as_str(), "https://t.me/+abc");
    }

    #[test]
    fn join_request_without_link_has_no_token() {
        let update = parse(
            r#"{"update_id": 2, "chat_join_request": {
                "chat": {"id": -1}, "from": {"id": 7, "first_name": "", "username": "bob"}
            }}"#,
        );

        let Some(InboundEvent::JoinRequest(event)) = update.into_event() else {
            panic!("expected join request");
        };
        assert!(event.used_invite_token.is_none());
        assert_eq!(event.from_display_name.as_deref(), Some("bob"));
    }

    #[test]
    fn left_and_kicked_members_are_departures() {
        for status in ["left", "kicked"] {
            let update = parse(&format!(
                r#"{{"update_id": 3, "chat_member": {{
                    "chat": {{"id": -1}},
                    "new_chat_member": {{"status": "{}", "user": {{"id": 9, "first_name": "C"}}}}
                }}}}"#,
                status
            ));
            assert_eq!(
                update.into_event(),
                Some(InboundEvent::MemberLeft(MemberLeftOrRemoved {
                    group_id: GroupId::new(-1),
                    platform_user_id: PlatformUserId::new(9),
                }))
            );
        }
    }

    #[test]
    fn new_member_status_is_ignored() {
        let update = parse(
            r#"{"update_id": 4, "chat_member": {
                "chat": {"id": -1},
                "new_chat_member": {"status": "member", "user": {"id": 9, "first_name": "C"}}
            }}"#,
        );
        assert!(update.into_event().is_none());
    }

    #[test]
    fn unrelated_update_is_ignored() {
        let update = parse(r#"{"update_id": 5, "message": {"message_id": 1}}"#);
        assert!(update.into_event().is_none());
    }
}
