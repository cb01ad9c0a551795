//! AdmissionArbiter - decides inbound join requests.
//!
//! The invite used for the request is the correlation key. Exactly one
//! request per invite is approved; everything else is declined. A replay of
//! the request that was already approved is recognised and left alone.
//!
//! The invite is claimed in the store before the platform approves the
//! request, so a request that loses the claim is never let in. A claim whose
//! approval fails is released again.

use std::sync::Arc;

use serde::Serialize;

use crate::application::{record_history, BestEffort, InviteIssuer, SubscriberNotifier};
use crate::domain::foundation::{GroupId, StateMachine, Timestamp};
use crate::domain::subscription::{
    HistoryKind, InviteToken, JoinRequestReceived, SubscriberRecord, SubscriptionError,
    SubscriptionState,
};
use crate::ports::{Clock, MembershipPlatform, RecordPatch, RecordPredicate, SubscriptionStore};

/// Why a join request was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    /// The request did not come through an invite link.
    NoInvite,
    /// No pending subscription holds this invite, or it was already used.
    UnknownOrUsedInvite,
    /// The subscription behind the invite has lapsed.
    SubscriptionExpired,
}

/// Outcome of arbitrating one join request.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    Approved {
        record: SubscriberRecord,
        revoke: BestEffort,
        welcome: BestEffort,
    },
    Declined(DeclineReason),
    /// Duplicate delivery of a request that was already approved.
    AlreadyAdmitted,
    /// Event for a group this service does not manage.
    Ignored,
}

/// Arbiter for join requests into the managed group.
pub struct AdmissionArbiter {
    store: Arc<dyn SubscriptionStore>,
    platform: Arc<dyn MembershipPlatform>,
    issuer: InviteIssuer,
    notifier: SubscriberNotifier,
    clock: Arc<dyn Clock>,
}

impl AdmissionArbiter {
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

    fn group(&self) -> GroupId {
        self.issuer.group()
    }

    pub async fn handle(
        &self,
        event: JoinRequestReceived,
    ) -> Result<AdmissionDecision, SubscriptionError> {
        // 1. Only the managed group
        if event.group_id != self.group() {
            tracing::debug!(group_id = %event.group_id, "join request for unmanaged group ignored");
            return Ok(AdmissionDecision::Ignored);
        }

        let Some(token) = event.used_invite_token.as_ref() else {
            return self.decline(&event, DeclineReason::NoInvite).await;
        };

        // 2. Correlate by invite
        let now = self.clock.now();
        let record = match self.store.find_by_token(token).await? {
            Some(record) => record,
            None => return self.decline(&event, DeclineReason::UnknownOrUsedInvite).await,
        };

        if record.invite_consumed {
            if record.joined && record.platform_id == Some(event.from_user_id) {
                tracing::debug!(
                    platform_user_id = %event.from_user_id,
                    "duplicate join request for admitted subscriber"
                );
                return Ok(AdmissionDecision::AlreadyAdmitted);
            }
            return self.decline(&event, DeclineReason::UnknownOrUsedInvite).await;
        }

        let state = record.state(now);
        if !state.is_entitled() {
            return self.decline(&event, DeclineReason::SubscriptionExpired).await;
        }
        if state.transition_to(SubscriptionState::Active).is_err() {
            return self.decline(&event, DeclineReason::UnknownOrUsedInvite).await;
        }

        // 3. Claim the invite atomically, then approve
        let predicate = RecordPredicate::any()
            .joined(false)
            .invite_consumed(false)
            .invite_token(Some(token.clone()));
        let patch = RecordPatch::at(now)
            .joined(true)
            .invite_consumed(true)
            .platform_id(Some(event.from_user_id))
            .display_name(event.from_display_name.clone())
            .departed_at(None);

        let Some(claimed) = self
            .store
            .conditional_update(&record.phone, &predicate, &patch)
            .await?
        else {
            return self.lost_claim(&event, &record).await;
        };

        if let Err(e) = self
            .platform
            .approve_join_request(self.group(), event.from_user_id)
            .await
        {
            self.release_claim(&record, &event, token, now).await;
            return Err(e.into());
        }

        tracing::info!(
            phone = %claimed.phone,
            platform_user_id = %event.from_user_id,
            "join request approved"
        );
        record_history(self.store.as_ref(), HistoryKind::Admitted, &claimed, now).await;

        // 4. Secondary effects never undo the admission
        let revoke = self.issuer.revoke(token).await;
        let welcome = self
            .notifier
            .welcome(event.from_user_id, claimed.expiry_at)
            .await;

        Ok(AdmissionDecision::Approved {
            record: claimed,
            revoke,
            welcome,
        })
    }

    /// Another request claimed the invite between our lookup and our claim.
    async fn lost_claim(
        &self,
        event: &JoinRequestReceived,
        seen: &SubscriberRecord,
    ) -> Result<AdmissionDecision, SubscriptionError> {
        let current = self.store.find_by_identity(&seen.phone).await?;
        let same_user = current
            .as_ref()
            .map(|r| r.joined && r.platform_id == Some(event.from_user_id))
            .unwrap_or(false);
        if same_user {
            tracing::debug!(
                platform_user_id = %event.from_user_id,
                "concurrent duplicate join request for admitted subscriber"
            );
            return Ok(AdmissionDecision::AlreadyAdmitted);
        }

        tracing::warn!(
            platform_user_id = %event.from_user_id,
            "invite claimed by another request"
        );
        self.decline(event, DeclineReason::UnknownOrUsedInvite).await
    }

    /// Undo a claim whose approval failed, restoring the fields it overwrote.
    ///
    /// Keyed on the claimant and token so it never touches a record that has
    /// moved on since.
    async fn release_claim(
        &self,
        before: &SubscriberRecord,
        event: &JoinRequestReceived,
        token: &InviteToken,
        now: Timestamp,
    ) {
        let predicate = RecordPredicate::any()
            .joined(true)
            .invite_consumed(true)
            .invite_token(Some(token.clone()))
            .platform_id(Some(event.from_user_id));
        let patch = RecordPatch::at(now)
            .joined(before.joined)
            .invite_consumed(before.invite_consumed)
            .platform_id(before.platform_id)
            .display_name(before.display_name.clone())
            .departed_at(before.departed_at);

        match self
            .store
            .conditional_update(&before.phone, &predicate, &patch)
            .await
        {
            Ok(Some(_)) => {
                tracing::info!(phone = %before.phone, "invite claim released after failed approval");
            }
            Ok(None) => {
                tracing::warn!(phone = %before.phone, "invite claim changed before it could be released");
            }
            Err(e) => {
                tracing::error!(
                    phone = %before.phone,
                    error = %e,
                    "failed to release invite claim after failed approval"
                );
            }
        }
    }

    async fn decline(
        &self,
        event: &JoinRequestReceived,
        reason: DeclineReason,
    ) -> Result<AdmissionDecision, SubscriptionError> {
        self.platform
            .decline_join_request(self.group(), event.from_user_id)
            .await?;

        tracing::info!(
            platform_user_id = %event.from_user_id,
            reason = ?reason,
            "join request declined"
        );

        self.notifier.invalid_link(event.from_user_id).await;
        Ok(AdmissionDecision::Declined(reason))
    }
}
