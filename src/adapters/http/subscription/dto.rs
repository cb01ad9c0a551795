//! Request and response bodies for the subscription API.

use serde::{Deserialize, Serialize};

use crate::application::handlers::subscription::{
    ExtendSubscriptionResult, RegenerateInviteResult, SubscribeOutcome, SubscribeResult,
    SubscriberListing,
};
use crate::application::BestEffort;
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{HistoryEntry, HistoryKind, SubscriberRecord, SubscriptionState};

// ════════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub phone: String,
    pub duration_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtendRequest {
    pub phone: String,
    pub extra_days: i64,
}

/// Body for endpoints keyed only by phone.
#[derive(Debug, Clone, Deserialize)]
pub struct PhoneRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkResolveRequest {
    pub phones: Vec<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════════

/// A subscriber record as exposed over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberResponse {
    pub id: String,
    pub phone: String,
    pub platform_id: Option<i64>,
    pub display_name: Option<String>,
    pub invite_link: Option<String>,
    pub invite_consumed: bool,
    pub expiry_at: Timestamp,
    pub joined: bool,
    pub departed_at: Option<Timestamp>,
    pub state: SubscriptionState,
}

impl SubscriberResponse {
    pub fn from_record(record: &SubscriberRecord, now: Timestamp) -> Self {
        Self {
            id: record.id.to_string(),
            phone: record.phone.to_string(),
            platform_id: record.platform_id.map(|id| id.value()),
            display_name: record.display_name.clone(),
            invite_link: record.invite_token.as_ref().map(|t| t.as_str().to_string()),
            invite_consumed: record.invite_consumed,
            expiry_at: record.expiry_at,
            joined: record.joined,
            departed_at: record.departed_at,
            state: record.state(now),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeResponse {
    pub subscriber: SubscriberResponse,
    pub outcome: SubscribeOutcome,
    pub notification: BestEffort,
}

impl SubscribeResponse {
    pub fn new(result: SubscribeResult, now: Timestamp) -> Self {
        Self {
            subscriber: SubscriberResponse::from_record(&result.record, now),
            outcome: result.outcome,
            notification: result.notification,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtendResponse {
    pub subscriber: SubscriberResponse,
    /// Set when the subscriber was outside the group and got a fresh link.
    pub new_invite: Option<String>,
    pub notification: BestEffort,
    /// No subscription existed, so one was started.
    pub created: bool,
}

impl ExtendResponse {
    pub fn new(result: ExtendSubscriptionResult, now: Timestamp) -> Self {
        Self {
            subscriber: SubscriberResponse::from_record(&result.record, now),
            new_invite: result.new_invite.map(|t| t.as_str().to_string()),
            notification: result.notification,
            created: result.created,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegenerateResponse {
    pub subscriber: SubscriberResponse,
    pub notification: BestEffort,
}

impl RegenerateResponse {
    pub fn new(result: RegenerateInviteResult, now: Timestamp) -> Self {
        Self {
            subscriber: SubscriberResponse::from_record(&result.record, now),
            notification: result.notification,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriberListResponse {
    pub joined_count: usize,
    pub pending_count: usize,
    pub joined: Vec<SubscriberResponse>,
    pub pending: Vec<SubscriberResponse>,
}

impl SubscriberListResponse {
    pub fn new(listing: SubscriberListing, now: Timestamp) -> Self {
        let convert = |records: &[SubscriberRecord]| -> Vec<SubscriberResponse> {
            records
                .iter()
                .map(|r| SubscriberResponse::from_record(r, now))
                .collect()
        };
        Self {
            joined_count: listing.joined_count,
            pending_count: listing.pending_count,
            joined: convert(&listing.joined),
            pending: convert(&listing.pending),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntryResponse {
    pub subscriber_id: String,
    pub platform_id: Option<i64>,
    pub kind: HistoryKind,
    pub expiry_at: Timestamp,
    pub occurred_at: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryEntryResponse>,
}

impl HistoryResponse {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| HistoryEntryResponse {
                    subscriber_id: e.subscriber_id.to_string(),
                    platform_id: e.platform_id.map(|id| id.value()),
                    kind: e.kind,
                    expiry_at: e.expiry_at,
                    occurred_at: e.occurred_at,
                })
                .collect(),
        }
    }
}

/// Error body: `{ "code": ..., "message": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PlatformUserId;
    use crate::domain::subscription::{InviteToken, PhoneNumber};

    fn record(now: Timestamp) -> SubscriberRecord {
        SubscriberRecord::new_pending(
            PhoneNumber::parse("+15550001111").unwrap(),
            InviteToken::new("https://t.me/+abc").unwrap(),
            now.add_days(30),
            now,
        )
    }

    #[test]
    fn pending_record_serializes_with_state() {
        let now = Timestamp::now();
        let json = serde_json::to_value(SubscriberResponse::from_record(&record(now), now)).unwrap();

        assert_eq!(json["phone"], "+15550001111");
        assert_eq!(json["invite_link"], "https://t.me/+abc");
        assert_eq!(json["joined"], false);
        assert!(json["platform_id"].is_null());
        assert!(json["state"].is_string());
    }

    #[test]
    fn listing_keeps_counts_and_partitions() {
        let now = Timestamp::now();
        let mut member = record(now);
        member.joined = true;
        member.invite_consumed = true;
        member.platform_id = Some(PlatformUserId::new(42));

        let response = SubscriberListResponse::new(
            SubscriberListing {
                joined_count: 1,
                pending_count: 1,
                joined: vec![member],
                pending: vec![record(now)],
            },
            now,
        );

        assert_eq!(response.joined[0].platform_id, Some(42));
        assert_eq!(response.pending[0].platform_id, None);
        assert_eq!(response.joined_count, 1);
    }

    #[test]
    fn error_body_uses_code_and_message() {
        let json = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "gone")).unwrap();
        assert_eq!(json, serde_json::json!({"code": "NOT_FOUND", "message": "gone"}));
    }
}
