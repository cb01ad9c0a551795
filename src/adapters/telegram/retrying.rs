//! Flood-wait retry decorator for any `MembershipPlatform`.
//!
//! On `RateLimited` the call is retried after sleeping at least the
//! indicated wait, up to `max_retries` times. Other errors pass straight
//! through.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::{GroupId, PlatformUserId};
use crate::domain::subscription::{InviteToken, PhoneNumber};
use crate::ports::{MembershipPlatform, PlatformError, ResolvedIdentity};

pub struct RetryingPlatform {
    inner: Arc<dyn MembershipPlatform>,
    max_retries: u32,
}

impl RetryingPlatform {
    pub fn new(inner: Arc<dyn MembershipPlatform>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }

    async fn with_retry<T, F, Fut>(&self, method: &'static str, mut call: F) -> Result<T, PlatformError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(PlatformError::RateLimited { retry_after }) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        method,
                        attempt,
                        retry_after_secs = retry_after.as_secs(),
                        "flood wait, backing off"
                    );
                    tokio::time::sleep(retry_after).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl MembershipPlatform for RetryingPlatform {
    async fn create_single_use_invite(
        &self,
        group: GroupId,
        ttl: Duration,
    ) -> Result<InviteToken, PlatformError> {
        self.with_retry("create_single_use_invite", move || {
            self.inner.create_single_use_invite(group, ttl)
        })
        .await
    }

    async fn revoke_invite(&self, group: GroupId, token: &InviteToken) -> Result<(), PlatformError> {
        self.with_retry("revoke_invite", move || self.inner.revoke_invite(group, token))
            .await
    }

    async fn approve_join_request(
        &self,
        group: GroupId,
        user: PlatformUserId,
    ) -> Result<(), PlatformError> {
        self.with_retry("approve_join_request", move || {
            self.inner.approve_join_request(group, user)
        })
        .await
    }

    async fn decline_join_request(
        &self,
        group: GroupId,
        user: PlatformUserId,
    ) -> Result<(), PlatformError> {
        self.with_retry("decline_join_request", move || {
            self.inner.decline_join_request(group, user)
        })
        .await
    }

    async fn remove_member(&self, group: GroupId, user: PlatformUserId) -> Result<(), PlatformError> {
        self.with_retry("remove_member", move || self.inner.remove_member(group, user))
            .await
    }

    async fn resolve_identity(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<ResolvedIdentity>, PlatformError> {
        self.with_retry("resolve_identity", move || self.inner.resolve_identity(phone))
            .await
    }

    async fn send_direct_message(&self, user: PlatformUserId, text: &str) -> Result<(), PlatformError> {
        self.with_retry("send_direct_message", move || {
            self.inner.send_direct_message(user, text)
        })
        .await
    }

    async fn post_to_chat(&self, chat: GroupId, text: &str) -> Result<(), PlatformError> {
        self.with_retry("post_to_chat", move || self.inner.post_to_chat(chat, text))
            .await
    }
}
