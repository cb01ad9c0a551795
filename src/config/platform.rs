//! Messaging platform configuration (Telegram Bot API)

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Bot API token
    pub bot_token: SecretString,

    /// Chat id of the gated group
    pub group_id: i64,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout for platform and resolver calls, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Lifetime of issued invite links
    #[serde(default = "default_invite_ttl_days")]
    pub invite_ttl_days: u32,

    /// Retries after a flood-wait before giving up
    #[serde(default = "default_max_flood_retries")]
    pub max_flood_retries: u32,

    /// Public URL registered with `setWebhook` at start-up
    pub webhook_url: Option<String>,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` value
    pub webhook_secret: Option<SecretString>,

    /// Base URL of the contact-resolver sidecar
    pub resolver_url: Option<String>,

    /// Chat that receives new-subscription notices
    pub announce_chat_id: Option<i64>,

    /// Pause between consecutive lookups in a bulk resolve
    #[serde(default = "default_bulk_resolve_delay")]
    pub bulk_resolve_delay_ms: u64,
}

impl PlatformConfig {
    pub fn new(bot_token: impl Into<String>, group_id: i64) -> Self {
        Self {
            bot_token: SecretString::new(bot_token.into()),
            group_id,
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout(),
            invite_ttl_days: default_invite_ttl_days(),
            max_flood_retries: default_max_flood_retries(),
            webhook_url: None,
            webhook_secret: None,
            resolver_url: None,
            announce_chat_id: None,
            bulk_resolve_delay_ms: default_bulk_resolve_delay(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn invite_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.invite_ttl_days) * 24 * 60 * 60)
    }

    pub fn bulk_resolve_delay(&self) -> Duration {
        Duration::from_millis(self.bulk_resolve_delay_ms)
    }

    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        use secrecy::ExposeSecret;

        if self.bot_token.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PLATFORM__BOT_TOKEN"));
        }
        if self.group_id == 0 {
            return Err(ValidationError::InvalidGroupId);
        }
        if self.invite_ttl_days == 0 || self.invite_ttl_days > 365 {
            return Err(ValidationError::InvalidInviteTtl);
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }

        if *environment == Environment::Production {
            if let Some(url) = &self.webhook_url {
                if !url.starts_with("https://") {
                    return Err(ValidationError::WebhookMustBeHttps);
                }
                let has_secret = self
                    .webhook_secret
                    .as_ref()
                    .map(|s| !s.expose_secret().is_empty())
                    .unwrap_or(false);
                if !has_secret {
                    return Err(ValidationError::WebhookSecretRequired);
                }
            }
        }
        Ok(())
    }
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_invite_ttl_days() -> u32 {
    7
}

fn default_max_flood_retries() -> u32 {
    3
}

fn default_bulk_resolve_delay() -> u64 {
    1000
}
