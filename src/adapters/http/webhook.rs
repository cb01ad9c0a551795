//! Telegram webhook endpoint.
//!
//! Calls must carry the configured secret in
//! `X-Telegram-Bot-Api-Secret-Token`; anything else gets 401 and is not
//! processed. Once authenticated the endpoint always answers 200, even when
//! the update could not be handled, so the platform never redelivers a
//! poisoned update. Failures are logged instead.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::adapters::telegram::{InboundEvent, Update};

use super::subscription::GateAppState;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

fn secret_matches(headers: &HeaderMap, expected: &SecretString) -> bool {
    let Some(provided) = headers.get(SECRET_HEADER) else {
        return false;
    };
    provided
        .as_bytes()
        .ct_eq(expected.expose_secret().as_bytes())
        .into()
}

/// POST /webhook/telegram
pub async fn telegram_webhook(
    State(state): State<GateAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(expected) = &state.webhook_secret {
        if !secret_matches(&headers, expected) {
            tracing::warn!("webhook call with missing or wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable webhook update");
            return StatusCode::OK;
        }
    };
    let update_id = update.update_id;

    match update.into_event() {
        Some(InboundEvent::JoinRequest(event)) => {
            let user = event.from_user_id;
            match state.arbiter.handle(event).await {
                Ok(decision) => {
                    tracing::debug!(update_id, platform_user_id = %user, ?decision, "join request handled")
                }
                Err(e) => {
                    tracing::error!(update_id, platform_user_id = %user, error = %e.message(), "join request failed")
                }
            }
        }
        Some(InboundEvent::MemberLeft(event)) => {
            let user = event.platform_user_id;
            match state.departures.handle(event).await {
                Ok(outcome) => {
                    tracing::debug!(update_id, platform_user_id = %user, ?outcome, "member update handled")
                }
                Err(e) => {
                    tracing::error!(update_id, platform_user_id = %user, error = %e.message(), "member update failed")
                }
            }
        }
        None => tracing::trace!(update_id, "update ignored"),
    }

    StatusCode::OK
}
