//! Mock membership platform for testing.
//!
//! Configurable stand-in for the Telegram adapter. Supports:
//! - Sequential invite tokens (`T1`, `T2`, ...)
//! - A contact book for identity resolution
//! - Error injection, persistent or one-shot, per method
//! - Call tracking and captured messages

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::{GroupId, PlatformUserId};
use crate::domain::subscription::{InviteToken, PhoneNumber};
use crate::ports::{MembershipPlatform, PlatformError, ResolvedIdentity};

/// Mock platform for tests.
#[derive(Default, Clone)]
pub struct MockMembershipPlatform {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    issued: u32,
    contacts: HashMap<String, ResolvedIdentity>,
    method_errors: HashMap<&'static str, PlatformError>,
    queued_errors: HashMap<&'static str, VecDeque<PlatformError>>,
    call_log: Vec<MethodCall>,
    messages: Vec<SentMessage>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: &'static str,
    pub args: Vec<String>,
}

/// A message captured by `send_direct_message` or `post_to_chat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
}

impl MockMembershipPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Register a reachable account for `phone`.
    pub fn add_contact(&self, phone: &str, user_id: i64, display_name: Option<&str>) {
        self.inner.lock().unwrap().contacts.insert(
            phone.to_string(),
            ResolvedIdentity {
                user_id: PlatformUserId::new(user_id),
                display_name: display_name.map(str::to_string),
            },
        );
    }

    /// Fail every call to `method` with `error`.
    pub fn set_method_error(&self, method: &'static str, error: PlatformError) {
        self.inner.lock().unwrap().method_errors.insert(method, error);
    }

    /// Fail the next call to `method` with `error`.
    pub fn push_method_error(&self, method: &'static str, error: PlatformError) {
        self.inner
            .lock()
            .unwrap()
            .queued_errors
            .entry(method)
            .or_default()
            .push_back(error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.inner.lock().unwrap();
        state.method_errors.clear();
        state.queued_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().unwrap().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Arguments of every call to `method`, in order.
    pub fn calls_to(&self, method: &str) -> Vec<Vec<String>> {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.args.clone())
            .collect()
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.inner.lock().unwrap().messages.clone()
    }

    /// Messages sent to one chat or user.
    pub fn messages_to(&self, chat_id: i64) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn clear_calls(&self) {
        let mut state = self.inner.lock().unwrap();
        state.call_log.clear();
        state.messages.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record(&self, method: &'static str, args: Vec<String>) -> Result<(), PlatformError> {
        let mut state = self.inner.lock().unwrap();
        state.call_log.push(MethodCall { method, args });

        if let Some(err) = state
            .queued_errors
            .get_mut(method)
            .and_then(|queue| queue.pop_front())
        {
            return Err(err);
        }
        match state.method_errors.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MembershipPlatform for MockMembershipPlatform {
    async fn create_single_use_invite(
        &self,
        group: GroupId,
        ttl: Duration,
    ) -> Result<InviteToken, PlatformError> {
        self.record(
            "create_single_use_invite",
            vec![group.to_string(), ttl.as_secs().to_string()],
        )?;
        let mut state = self.inner.lock().unwrap();
        state.issued += 1;
        InviteToken::new(format!("T{}", state.issued))
            .map_err(|e| PlatformError::rejected(e.to_string()))
    }

    async fn revoke_invite(
        &self,
        group: GroupId,
        token: &InviteToken,
    ) -> Result<(), PlatformError> {
        self.record("revoke_invite", vec![group.to_string(), token.to_string()])
    }

    async fn approve_join_request(
        &self,
        group: GroupId,
        user: PlatformUserId,
    ) -> Result<(), PlatformError> {
        self.record("approve_join_request", vec![group.to_string(), user.to_string()])
    }

    async fn decline_join_request(
        &self,
        group: GroupId,
        user: PlatformUserId,
    ) -> Result<(), PlatformError> {
        self.record("decline_join_request", vec![group.to_string(), user.to_string()])
    }

    async fn remove_member(
        &self,
        group: GroupId,
        user: PlatformUserId,
    ) -> Result<(), PlatformError> {
        self.record("remove_member", vec![group.to_string(), user.to_string()])
    }

    async fn resolve_identity(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<ResolvedIdentity>, PlatformError> {
        self.record("resolve_identity", vec![phone.to_string()])?;
        Ok(self.inner.lock().unwrap().contacts.get(phone.as_str()).cloned())
    }

    async fn send_direct_message(
        &self,
        user: PlatformUserId,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.record("send_direct_message", vec![user.to_string()])?;
        self.inner.lock().unwrap().messages.push(SentMessage {
            chat_id: user.value(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn post_to_chat(&self, chat: GroupId, text: &str) -> Result<(), PlatformError> {
        self.record("post_to_chat", vec![chat.to_string()])?;
        self.inner.lock().unwrap().messages.push(SentMessage {
            chat_id: chat.value(),
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issues_sequential_tokens() {
        let platform = MockMembershipPlatform::new();
        let group = GroupId::new(-100);
        let ttl = Duration::from_secs(60);

        let t1 = platform.create_single_use_invite(group, ttl).await.unwrap();
        let t2 = platform.create_single_use_invite(group, ttl).await.unwrap();
        assert_eq!(t1.as_str(), "T1");
        assert_eq!(t2.as_str(), "T2");
    }

    #[tokio::test]
    async fn one_shot_errors_fire_once() {
        let platform = MockMembershipPlatform::new();
        platform.push_method_error("remove_member", PlatformError::Timeout);

        let group = GroupId::new(-100);
        let user = PlatformUserId::new(1);
        assert!(platform.remove_member(group, user).await.is_err());
        assert!(platform.remove_member(group, user).await.is_ok());
        assert_eq!(platform.call_count("remove_member"), 2);
    }

    #[tokio::test]
    async fn resolves_registered_contacts_only() {
        let platform = MockMembershipPlatform::new();
        platform.add_contact("+15550001111", 42, Some("Alice"));

        let found = platform
            .resolve_identity(&PhoneNumber::parse("+15550001111").unwrap())
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.user_id), Some(PlatformUserId::new(42)));

        let missing = platform
            .resolve_identity(&PhoneNumber::parse("+15550009999").unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
