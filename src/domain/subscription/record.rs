//! Subscriber record aggregate.
//!
//! One record per subscriber identity. The record is the single source of
//! truth for admission decisions.
//!
//! # Invariants
//!
//! - `phone` is immutable once set
//! - at most one outstanding, unconsumed `invite_token`
//! - `joined == true` implies `invite_consumed == true`
//! - `expiry_at` only moves forward

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PlatformUserId, SubscriberId, Timestamp};

use super::{InviteToken, PhoneNumber, SubscriptionState};

/// Durable record of one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub id: SubscriberId,

    /// External contact key, normalized to E.164.
    pub phone: PhoneNumber,

    /// Platform identity, unknown until the first admission.
    pub platform_id: Option<PlatformUserId>,

    pub display_name: Option<String>,

    /// Currently outstanding invite, if any.
    pub invite_token: Option<InviteToken>,

    /// True once `invite_token` has been used to gain admission.
    pub invite_consumed: bool,

    /// Membership is not authorized after this instant.
    pub expiry_at: Timestamp,

    /// True while the subscriber is a member of the group.
    pub joined: bool,

    /// Last observed departure from the group.
    pub departed_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// What a subscribe call must do given the existing record (if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeAction {
    /// No record exists: resolve, issue and create.
    Create,
    /// Subscriber is already in the group.
    RejectAlreadyMember,
    /// A live invite is already outstanding.
    RejectAlreadyPending,
    /// Departed but still entitled: revoke and reissue, keep expiry.
    ReissueAfterDeparture,
    /// Expired but not yet swept: start a fresh subscription in place.
    Restart,
}

impl SubscriberRecord {
    /// Create a new pending record holding a freshly issued invite.
    pub fn new_pending(
        phone: PhoneNumber,
        invite_token: InviteToken,
        expiry_at: Timestamp,
        now: Timestamp,
    ) -> Self {
        Self {
            id: SubscriberId::new(),
            phone,
            platform_id: None,
            display_name: None,
            invite_token: Some(invite_token),
            invite_consumed: false,
            expiry_at,
            joined: false,
            departed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once `expiry_at` lies strictly in the past.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry_at.is_before(&now)
    }

    /// Lifecycle state at `now`.
    pub fn state(&self, now: Timestamp) -> SubscriptionState {
        if self.is_expired(now) {
            SubscriptionState::ExpiredPendingRemoval
        } else if self.joined {
            SubscriptionState::Active
        } else if self.departed_at.is_some() && self.invite_consumed {
            SubscriptionState::Departed
        } else {
            SubscriptionState::Pending
        }
    }

    /// New expiry after adding `extra_days`.
    ///
    /// The base is clamped to `now`, so a lapsed subscription restarts from
    /// today and a live one never moves backwards.
    pub fn extended_expiry(&self, extra_days: i64, now: Timestamp) -> Timestamp {
        self.expiry_at.max(now).add_days(extra_days)
    }

    /// Whether a departed subscriber may ask for a fresh invite.
    ///
    /// Holds until they rejoin or the subscription lapses, so a subscriber who
    /// lost a regenerated link can ask again.
    pub fn can_regenerate(&self, now: Timestamp) -> bool {
        !self.joined && self.departed_at.is_some() && !self.is_expired(now)
    }
}

impl SubscribeAction {
    /// Decide how a subscribe request must proceed given the stored record.
    pub fn decide(existing: Option<&SubscriberRecord>, now: Timestamp) -> Self {
        let Some(record) = existing else {
            return SubscribeAction::Create;
        };
        if record.joined {
            return SubscribeAction::RejectAlreadyMember;
        }
        if record.is_expired(now) {
            SubscribeAction::Restart
        } else if record.can_regenerate(now) {
            SubscribeAction::ReissueAfterDeparture
        } else {
            SubscribeAction::RejectAlreadyPending
        }
    }
}
