//! Telegram Bot API adapter.
//!
//! Implements `MembershipPlatform` over the Bot API's JSON-over-HTTPS
//! methods. Contact lookup is delegated to the resolver sidecar, since bots
//! cannot look users up by phone number.
//!
//! # Security
//!
//! The bot token is part of every request URL. It is held as a
//! `secrecy::SecretString` and reqwest errors are stripped of their URL
//! before being turned into `PlatformError`s.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::foundation::{GroupId, PlatformUserId};
use crate::domain::subscription::{InviteToken, PhoneNumber};
use crate::ports::{MembershipPlatform, PlatformError, ResolvedIdentity};

use super::resolver::ContactResolverClient;

/// Updates the webhook subscribes to.
pub const ALLOWED_UPDATES: [&str; 2] = ["chat_join_request", "chat_member"];

/// Rejections meaning an invite is already unusable.
const GONE_INVITE: &[&str] = &["not found", "expired", "invite_hash_invalid", "revoked"];

/// Rejections meaning the user is not in the group anyway.
const ABSENT_MEMBER: &[&str] = &[
    "user not found",
    "user_not_participant",
    "participant_id_invalid",
    "member not found",
    "not a member",
];

/// Bot API connection settings.
#[derive(Clone)]
pub struct TelegramConfig {
    bot_token: SecretString,
    api_base_url: String,
    request_timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            api_base_url: "https://api.telegram.org".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing or a local Bot API server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl<T> ApiEnvelope<T> {
    fn into_result(self) -> Result<T, PlatformError> {
        if self.ok {
            return self
                .result
                .ok_or_else(|| PlatformError::Unavailable("response missing result".to_string()));
        }

        let description = self
            .description
            .unwrap_or_else(|| "no description".to_string());
        match self.error_code {
            Some(429) => {
                let secs = self
                    .parameters
                    .and_then(|p| p.retry_after)
                    .unwrap_or(1);
                Err(PlatformError::RateLimited {
                    retry_after: Duration::from_secs(secs),
                })
            }
            Some(code) if code >= 500 => Err(PlatformError::Unavailable(description)),
            _ => Err(PlatformError::rejected(description)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatInviteLink {
    invite_link: String,
}

/// Whether `err` is a rejection whose description contains one of `needles`.
fn is_rejection_of(err: &PlatformError, needles: &[&str]) -> bool {
    match err {
        PlatformError::Rejected { description } => {
            let description = description.to_lowercase();
            needles.iter().any(|needle| description.contains(needle))
        }
        _ => false,
    }
}

fn transport_error(e: reqwest::Error) -> PlatformError {
    if e.is_timeout() {
        PlatformError::Timeout
    } else {
        PlatformError::Unavailable(e.without_url().to_string())
    }
}

/// Telegram implementation of the `MembershipPlatform` port.
pub struct TelegramPlatform {
    config: TelegramConfig,
    http_client: reqwest::Client,
    resolver: Option<ContactResolverClient>,
}

impl TelegramPlatform {
    pub fn new(config: TelegramConfig, resolver: Option<ContactResolverClient>) -> Result<Self, PlatformError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self {
            config,
            http_client,
            resolver,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, PlatformError> {
        let url = format!(
            "{}/bot{}/{}",
            self.config.api_base_url,
            self.config.bot_token.expose_secret(),
            method
        );

        let response = self
            .http_client
            .post(&url)
            .json(&params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let envelope: ApiEnvelope<T> = response.json().await.map_err(|e| {
            if status.is_server_error() {
                PlatformError::Unavailable(format!("{} from {}", status, method))
            } else {
                transport_error(e)
            }
        })?;

        envelope.into_result()
    }

    /// Register the public webhook URL with the platform.
    pub async fn set_webhook(&self, url: &str, secret: Option<&SecretString>) -> Result<(), PlatformError> {
        let mut params = json!({
            "url": url,
            "allowed_updates": ALLOWED_UPDATES,
        });
        if let Some(secret) = secret {
            params["secret_token"] = json!(secret.expose_secret());
        }
        self.call::<bool>("setWebhook", params).await?;
        tracing::info!(url, "webhook registered");
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<(), PlatformError> {
        self.call::<bool>("deleteWebhook", json!({})).await?;
        tracing::info!("webhook deregistered");
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), PlatformError> {
        self.call::<Value>(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MembershipPlatform for TelegramPlatform {
    async fn create_single_use_invite(
        &self,
        group: GroupId,
        ttl: Duration,
    ) -> Result<InviteToken, PlatformError> {
        // The Bot API refuses member_limit on join-request links; single use
        // is enforced by the arbiter and revocation after admission.
        let expire_date = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let link: ChatInviteLink = self
            .call(
                "createChatInviteLink",
                json!({
                    "chat_id": group.value(),
                    "expire_date": expire_date,
                    "creates_join_request": true,
                }),
            )
            .await?;

        InviteToken::new(link.invite_link).map_err(|e| PlatformError::rejected(e.to_string()))
    }

    async fn revoke_invite(&self, group: GroupId, token: &InviteToken) -> Result<(), PlatformError> {
        let result = self
            .call::<Value>(
                "revokeChatInviteLink",
                json!({ "chat_id": group.value(), "invite_link": token.as_str() }),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_rejection_of(&e, GONE_INVITE) => {
                tracing::debug!(error = %e, "invite already unusable");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn approve_join_request(
        &self,
        group: GroupId,
        user: PlatformUserId,
    ) -> Result<(), PlatformError> {
        self.call::<bool>(
            "approveChatJoinRequest",
            json!({ "chat_id": group.value(), "user_id": user.value() }),
        )
        .await?;
        Ok(())
    }

    async fn decline_join_request(
        &self,
        group: GroupId,
        user: PlatformUserId,
    ) -> Result<(), PlatformError> {
        self.call::<bool>(
            "declineChatJoinRequest",
            json!({ "chat_id": group.value(), "user_id": user.value() }),
        )
        .await?;
        Ok(())
    }

    async fn remove_member(&self, group: GroupId, user: PlatformUserId) -> Result<(), PlatformError> {
        let banned = self
            .call::<bool>(
                "banChatMember",
                json!({ "chat_id": group.value(), "user_id": user.value(), "revoke_messages": false }),
            )
            .await;

        match banned {
            Ok(_) => {}
            Err(e) if is_rejection_of(&e, ABSENT_MEMBER) => {
                tracing::debug!(platform_user_id = %user, "member already absent");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        // Unban straight away so a later invite still works.
        self.call::<bool>(
            "unbanChatMember",
            json!({ "chat_id": group.value(), "user_id": user.value(), "only_if_banned": true }),
        )
        .await?;
        Ok(())
    }

    async fn resolve_identity(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<ResolvedIdentity>, PlatformError> {
        match &self.resolver {
            Some(resolver) => resolver.resolve(phone).await,
            None => Ok(None),
        }
    }

    async fn send_direct_message(&self, user: PlatformUserId, text: &str) -> Result<(), PlatformError> {
        self.send_message(user.value(), text).await
    }

    async fn post_to_chat(&self, chat: GroupId, text: &str) -> Result<(), PlatformError> {
        self.send_message(chat.value(), text).await
    }
}
