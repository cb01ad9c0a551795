//! Subscriber notifications.
//!
//! All messages are best-effort: the caller's primary effect has already
//! been stored when these run.

use std::sync::Arc;

use crate::domain::foundation::{GroupId, PlatformUserId, Timestamp};
use crate::domain::subscription::{InviteToken, PhoneNumber};
use crate::ports::MembershipPlatform;

use super::BestEffort;

/// Sends lifecycle messages to subscribers and the announcement chat.
#[derive(Clone)]
pub struct SubscriberNotifier {
    platform: Arc<dyn MembershipPlatform>,
    announce_chat: Option<GroupId>,
}

impl SubscriberNotifier {
    pub fn new(platform: Arc<dyn MembershipPlatform>, announce_chat: Option<GroupId>) -> Self {
        Self {
            platform,
            announce_chat,
        }
    }

    /// Who to message about `phone`: the known platform id, or a best-effort
    /// contact lookup.
    pub async fn recipient(
        &self,
        known: Option<PlatformUserId>,
        phone: &PhoneNumber,
    ) -> Option<PlatformUserId> {
        if known.is_some() {
            return known;
        }
        match self.platform.resolve_identity(phone).await {
            Ok(found) => found.map(|identity| identity.user_id),
            Err(e) => {
                tracing::warn!(phone = %phone, error = %e, "could not resolve notification recipient");
                None
            }
        }
    }

    pub async fn invite(
        &self,
        user: Option<PlatformUserId>,
        token: &InviteToken,
        expiry_at: Timestamp,
    ) -> BestEffort {
        let text = format!(
            "Your subscription is ready until {}.\n\nTap to join (single use, approved automatically):\n{}",
            expiry_at.date_string(),
            escape_html(token.as_str())
        );
        self.direct("notify_invite", user, text).await
    }

    pub async fn welcome(&self, user: PlatformUserId, expiry_at: Timestamp) -> BestEffort {
        let text = format!(
            "Welcome! Your subscription is active until {}.",
            expiry_at.date_string()
        );
        self.direct("notify_welcome", Some(user), text).await
    }

    pub async fn invalid_link(&self, user: PlatformUserId) -> BestEffort {
        self.direct(
            "notify_invalid_link",
            Some(user),
            "This link is invalid or already used.".to_string(),
        )
        .await
    }

    pub async fn extended(
        &self,
        user: Option<PlatformUserId>,
        expiry_at: Timestamp,
        new_invite: Option<&InviteToken>,
    ) -> BestEffort {
        let mut text = format!("Plan extended to {}", expiry_at.date_string());
        if let Some(token) = new_invite {
            text.push_str("\n\nYour new invite link:\n");
            text.push_str(&escape_html(token.as_str()));
        }
        self.direct("notify_extended", user, text).await
    }

    /// Tell the announcement chat that someone subscribed.
    pub async fn announce_subscription(
        &self,
        phone: &PhoneNumber,
        display_name: Option<&str>,
    ) -> BestEffort {
        let Some(chat) = self.announce_chat else {
            return BestEffort::Skipped;
        };
        let who = match display_name {
            Some(name) => escape_html(name),
            None => mask_phone(phone),
        };
        let text = format!(
            "🎉 A new user has subscribed and is eligible to join the group! Subscriber: {}",
            who
        );
        BestEffort::attempt("announce_subscription", self.platform.post_to_chat(chat, &text)).await
    }

    async fn direct(
        &self,
        action: &'static str,
        user: Option<PlatformUserId>,
        text: String,
    ) -> BestEffort {
        match user {
            Some(user) => {
                BestEffort::attempt(action, self.platform.send_direct_message(user, &text)).await
            }
            None => BestEffort::Skipped,
        }
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Keeps the last four digits, e.g. `+1******1111`.
fn mask_phone(phone: &PhoneNumber) -> String {
    let digits = phone.as_str();
    let visible = digits.len().saturating_sub(4);
    digits
        .char_indices()
        .map(|(i, c)| if i < 2 || i >= visible { c } else { '*' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::telegram::MockMembershipPlatform;
    use crate::ports::PlatformError;

    fn notifier(platform: &MockMembershipPlatform, announce: Option<i64>) -> SubscriberNotifier {
        SubscriberNotifier::new(Arc::new(platform.clone()), announce.map(GroupId::new))
    }

    #[tokio::test]
    async fn recipient_prefers_known_id_over_lookup() {
        let platform = MockMembershipPlatform::new();
        platform.add_contact("+15550001111", 7, None);
        let phone = PhoneNumber::parse("+15550001111").unwrap();
        let n = notifier(&platform, None);

        assert_eq!(
            n.recipient(Some(PlatformUserId::new(9)), &phone).await,
            Some(PlatformUserId::new(9))
        );
        assert!(!platform.was_called("resolve_identity"));
        assert_eq!(n.recipient(None, &phone).await, Some(PlatformUserId::new(7)));
    }

    #[tokio::test]
    async fn recipient_lookup_failure_yields_none() {
        let platform = MockMembershipPlatform::new();
        platform.set_method_error("resolve_identity", PlatformError::Timeout);
        let phone = PhoneNumber::parse("+15550001111").unwrap();

        assert_eq!(notifier(&platform, None).recipient(None, &phone).await, None);
    }

    #[tokio::test]
    async fn invite_without_recipient_is_skipped() {
        let platform = MockMembershipPlatform::new();
        let outcome = notifier(&platform, None)
            .invite(None, &InviteToken::new("T1").unwrap(), Timestamp::now())
            .await;

        assert_eq!(outcome, BestEffort::Skipped);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn invite_message_carries_link() {
        let platform = MockMembershipPlatform::new();
        let outcome = notifier(&platform, None)
            .invite(
                Some(PlatformUserId::new(42)),
                &InviteToken::new("https://t.me/+abc").unwrap(),
                Timestamp::now(),
            )
            .await;

        assert!(outcome.is_delivered());
        assert!(platform.messages_to(42)[0].contains("https://t.me/+abc"));
    }

    #[tokio::test]
    async fn send_failure_is_reported_not_raised() {
        let platform = MockMembershipPlatform::new();
        platform.set_method_error("send_direct_message", PlatformError::rejected("blocked"));

        let outcome = notifier(&platform, None)
            .welcome(PlatformUserId::new(42), Timestamp::now())
            .await;
        assert!(matches!(outcome, BestEffort::Failed(_)));
    }

    #[tokio::test]
    async fn announcement_is_skipped_without_chat() {
        let platform = MockMembershipPlatform::new();
        let phone = PhoneNumber::parse("+15550001111").unwrap();

        let outcome = notifier(&platform, None)
            .announce_subscription(&phone, None)
            .await;
        assert_eq!(outcome, BestEffort::Skipped);
    }

    #[tokio::test]
    async fn announcement_masks_phone() {
        let platform = MockMembershipPlatform::new();
        let phone = PhoneNumber::parse("+15550001111").unwrap();

        notifier(&platform, Some(-200))
            .announce_subscription(&phone, None)
            .await;

        let sent = platform.messages_to(-200);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].ends_with("+1******1111"));
    }

    #[test]
    fn escapes_html_in_display_names() {
        assert_eq!(escape_html("<b>&"), "&lt;b&gt;&amp;");
    }
}
