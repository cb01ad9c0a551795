//! SubscribeHandler - Command handler for starting a subscription.
//!
//! Conflict rules, keyed on the stored record rather than the request:
//!
//! | Stored record | Outcome |
//! |---------------|---------|
//! | none | resolve identity, issue invite, create pending record |
//! | joined | `AlreadyMember` |
//! | not joined, live invite | `AlreadyPending` |
//! | departed, not expired | revoke and reissue, expiry kept |
//! | expired, not joined | reset in place with a new expiry |

use std::sync::Arc;

use serde::Serialize;

use crate::application::{record_history, BestEffort, InviteIssuer, SubscriberNotifier};
use crate::domain::foundation::{Timestamp, ValidationError};
use crate::domain::subscription::{
    HistoryKind, InviteToken, PhoneNumber, SubscribeAction, SubscriberRecord, SubscriptionError,
};
use crate::ports::{Clock, MembershipPlatform, RecordPatch, RecordPredicate, SubscriptionStore};

/// Longest subscription a single call may buy.
pub const MAX_DURATION_DAYS: i64 = 3650;

/// Command to start a subscription.
#[derive(Debug, Clone)]
pub struct SubscribeCommand {
    pub phone: String,
    pub duration_days: i64,
}

/// How the subscription was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeOutcome {
    Created,
    Reissued,
    Restarted,
}

/// Result of a successful subscribe.
#[derive(Debug, Clone)]
pub struct SubscribeResult {
    pub record: SubscriberRecord,
    pub outcome: SubscribeOutcome,
    pub notification: BestEffort,
}

/// Handler for subscribe requests.
pub struct SubscribeHandler {
    store: Arc<dyn SubscriptionStore>,
    platform: Arc<dyn MembershipPlatform>,
    issuer: InviteIssuer,
    notifier: SubscriberNotifier,
    clock: Arc<dyn Clock>,
}

impl SubscribeHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        platform: Arc<dyn MembershipPlatform>,
        issuer: InviteIssuer,
        notifier: SubscriberNotifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            platform,
            issuer,
            notifier,
            clock,
        }
    }

    pub async fn handle(&self, cmd: SubscribeCommand) -> Result<SubscribeResult, SubscriptionError> {
        // 1. Validate input before any side effect
        if !(1..=MAX_DURATION_DAYS).contains(&cmd.duration_days) {
            return Err(ValidationError::out_of_range(
                "duration_days",
                1,
                MAX_DURATION_DAYS,
                cmd.duration_days,
            )
            .into());
        }
        let phone = PhoneNumber::parse(&cmd.phone)?;
        let now = self.clock.now();

        // 2. Branch on the stored record
        let existing = self.store.find_by_identity(&phone).await?;
        match SubscribeAction::decide(existing.as_ref(), now) {
            SubscribeAction::Create => self.create(phone, cmd.duration_days, now).await,
            SubscribeAction::RejectAlreadyMember => {
                Err(SubscriptionError::already_member(phone.as_str()))
            }
            SubscribeAction::RejectAlreadyPending => {
                Err(SubscriptionError::already_pending(phone.as_str()))
            }
            SubscribeAction::ReissueAfterDeparture => match existing {
                Some(record) => self.reissue(record, now).await,
                None => Err(SubscriptionError::not_found(phone.as_str())),
            },
            SubscribeAction::Restart => match existing {
                Some(record) => self.restart(record, cmd.duration_days, now).await,
                None => Err(SubscriptionError::not_found(phone.as_str())),
            },
        }
    }

    /// Create a pending record for an identity with no stored record.
    pub(super) async fn create(
        &self,
        phone: PhoneNumber,
        duration_days: i64,
        now: Timestamp,
    ) -> Result<SubscribeResult, SubscriptionError> {
        let identity = self
            .platform
            .resolve_identity(&phone)
            .await?
            .ok_or_else(|| SubscriptionError::identity_not_resolvable(phone.as_str()))?;

        let token = self.issuer.issue().await?;
        let mut record =
            SubscriberRecord::new_pending(phone, token.clone(), now.add_days(duration_days), now);
        record.display_name = identity.display_name.clone();

        let inserted = match self.store.insert_new(&record).await {
            Ok(inserted) => inserted,
            Err(e) => {
                // Nothing was stored, so the invite must not stay usable.
                self.issuer.revoke(&token).await;
                return Err(e.into());
            }
        };
        if !inserted {
            // A concurrent subscribe created the record first.
            self.issuer.revoke(&token).await;
            let winner = self.store.find_by_identity(&record.phone).await?;
            return Err(match winner {
                Some(r) if r.joined => SubscriptionError::already_member(record.phone.as_str()),
                _ => SubscriptionError::already_pending(record.phone.as_str()),
            });
        }

        tracing::info!(
            phone = %record.phone,
            expiry_at = %record.expiry_at,
            "subscription created"
        );
        record_history(self.store.as_ref(), HistoryKind::Subscribed, &record, now).await;

        let notification = self
            .notifier
            .invite(Some(identity.user_id), &token, record.expiry_at)
            .await;
        self.notifier
            .announce_subscription(&record.phone, record.display_name.as_deref())
            .await;

        Ok(SubscribeResult {
            record,
            outcome: SubscribeOutcome::Created,
            notification,
        })
    }

    async fn reissue(
        &self,
        existing: SubscriberRecord,
        now: Timestamp,
    ) -> Result<SubscribeResult, SubscriptionError> {
        let token = self.issuer.reissue(existing.invite_token.as_ref()).await?;

        let predicate = RecordPredicate::any()
            .joined(false)
            .invite_token(existing.invite_token.clone())
            .expiry_at(existing.expiry_at);
        let patch = RecordPatch::at(now)
            .invite_token(Some(token.clone()))
            .invite_consumed(false);

        let record = self
            .apply_or_revoke(&existing, &predicate, &patch, &token, now, "reissue invite for")
            .await?;

        tracing::info!(phone = %record.phone, "invite reissued after departure");
        record_history(self.store.as_ref(), HistoryKind::InviteReissued, &record, now).await;

        let notification = self
            .notifier
            .invite(existing.platform_id, &token, record.expiry_at)
            .await;

        Ok(SubscribeResult {
            record,
            outcome: SubscribeOutcome::Reissued,
            notification,
        })
    }

    async fn restart(
        &self,
        existing: SubscriberRecord,
        duration_days: i64,
        now: Timestamp,
    ) -> Result<SubscribeResult, SubscriptionError> {
        let token = self.issuer.reissue(existing.invite_token.as_ref()).await?;

        let predicate = RecordPredicate::any()
            .joined(false)
            .invite_token(existing.invite_token.clone())
            .expiry_at(existing.expiry_at);
        let patch = RecordPatch::at(now)
            .invite_token(Some(token.clone()))
            .invite_consumed(false)
            .expiry_at(now.add_days(duration_days))
            .departed_at(None);

        let record = self
            .apply_or_revoke(&existing, &predicate, &patch, &token, now, "restart")
            .await?;

        tracing::info!(
            phone = %record.phone,
            expiry_at = %record.expiry_at,
            "expired subscription restarted"
        );
        record_history(self.store.as_ref(), HistoryKind::Restarted, &record, now).await;

        let recipient = self
            .notifier
            .recipient(existing.platform_id, &record.phone)
            .await;
        let notification = self.notifier.invite(recipient, &token, record.expiry_at).await;

        Ok(SubscribeResult {
            record,
            outcome: SubscribeOutcome::Restarted,
            notification,
        })
    }

    /// Apply a conditional update; if the record changed underneath us,
    /// revoke the invite we just created and report the conflict.
    async fn apply_or_revoke(
        &self,
        existing: &SubscriberRecord,
        predicate: &RecordPredicate,
        patch: &RecordPatch,
        new_token: &InviteToken,
        now: Timestamp,
        attempted: &str,
    ) -> Result<SubscriberRecord, SubscriptionError> {
        let updated = match self
            .store
            .conditional_update(&existing.phone, predicate, patch)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                self.issuer.revoke(new_token).await;
                return Err(e.into());
            }
        };

        match updated {
            Some(record) => Ok(record),
            None => {
                self.issuer.revoke(new_token).await;
                let current = self
                    .store
                    .find_by_identity(&existing.phone)
                    .await?
                    .map(|r| r.state(now).to_string())
                    .unwrap_or_else(|| "removed".to_string());
                Err(SubscriptionError::invalid_state(current, attempted))
            }
        }
    }
}
