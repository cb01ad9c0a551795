//! Subscription store port.
//!
//! Durable record of every subscriber, keyed by normalized phone number.
//! The store is the single source of truth for admission decisions.
//!
//! # Atomicity
//!
//! Read-then-write mutations ("admit if not already joined", "extend from the
//! current expiry") go through [`SubscriptionStore::conditional_update`],
//! which implementations must execute as one compare-and-set at the storage
//! layer. Handlers never hold a store lock across a platform call.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PlatformUserId, Timestamp};
use crate::domain::subscription::{HistoryEntry, InviteToken, PhoneNumber, SubscriberRecord};

/// Condition a record must satisfy for a conditional update to apply.
///
/// Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPredicate {
    pub joined: Option<bool>,
    pub invite_consumed: Option<bool>,
    /// Expected current token (`Some(None)` requires no outstanding token).
    pub invite_token: Option<Option<InviteToken>>,
    /// Expected current expiry.
    pub expiry_at: Option<Timestamp>,
    /// Requires `expiry_at` strictly before this instant.
    pub expired_before: Option<Timestamp>,
    /// Requires `departed_at` to be set (`true`) or unset (`false`).
    pub departed: Option<bool>,
    /// Expected bound platform identity (`Some(None)` requires none).
    pub platform_id: Option<Option<PlatformUserId>>,
}

impl RecordPredicate {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn joined(mut self, joined: bool) -> Self {
        self.joined = Some(joined);
        self
    }

    pub fn invite_consumed(mut self, consumed: bool) -> Self {
        self.invite_consumed = Some(consumed);
        self
    }

    pub fn invite_token(mut self, token: Option<InviteToken>) -> Self {
        self.invite_token = Some(token);
        self
    }

    pub fn expiry_at(mut self, expiry_at: Timestamp) -> Self {
        self.expiry_at = Some(expiry_at);
        self
    }

    pub fn expired_before(mut self, now: Timestamp) -> Self {
        self.expired_before = Some(now);
        self
    }

    pub fn departed(mut self, departed: bool) -> Self {
        self.departed = Some(departed);
        self
    }

    pub fn platform_id(mut self, id: Option<PlatformUserId>) -> Self {
        self.platform_id = Some(id);
        self
    }

    /// Evaluates the predicate against a record.
    pub fn matches(&self, record: &SubscriberRecord) -> bool {
        if let Some(joined) = self.joined {
            if record.joined != joined {
                return false;
            }
        }
        if let Some(consumed) = self.invite_consumed {
            if record.invite_consumed != consumed {
                return false;
            }
        }
        if let Some(token) = &self.invite_token {
            if &record.invite_token != token {
                return false;
            }
        }
        if let Some(expiry_at) = self.expiry_at {
            if record.expiry_at != expiry_at {
                return false;
            }
        }
        if let Some(now) = self.expired_before {
            if !record.expiry_at.is_before(&now) {
                return false;
            }
        }
        if let Some(departed) = self.departed {
            if record.departed_at.is_some() != departed {
                return false;
            }
        }
        if let Some(id) = self.platform_id {
            if record.platform_id != id {
                return false;
            }
        }
        true
    }
}

/// Field changes applied by a conditional update. Unset fields are left as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPatch {
    pub platform_id: Option<Option<PlatformUserId>>,
    pub display_name: Option<Option<String>>,
    pub invite_token: Option<Option<InviteToken>>,
    pub invite_consumed: Option<bool>,
    pub expiry_at: Option<Timestamp>,
    pub joined: Option<bool>,
    pub departed_at: Option<Option<Timestamp>>,
    pub updated_at: Timestamp,
}

impl RecordPatch {
    /// Starts an empty patch stamped with `updated_at`.
    pub fn at(updated_at: Timestamp) -> Self {
        Self {
            platform_id: None,
            display_name: None,
            invite_token: None,
            invite_consumed: None,
            expiry_at: None,
            joined: None,
            departed_at: None,
            updated_at,
        }
    }

    pub fn platform_id(mut self, id: Option<PlatformUserId>) -> Self {
        self.platform_id = Some(id);
        self
    }

    pub fn display_name(mut self, name: Option<String>) -> Self {
        self.display_name = Some(name);
        self
    }

    pub fn invite_token(mut self, token: Option<InviteToken>) -> Self {
        self.invite_token = Some(token);
        self
    }

    pub fn invite_consumed(mut self, consumed: bool) -> Self {
        self.invite_consumed = Some(consumed);
        self
    }

    pub fn expiry_at(mut self, expiry_at: Timestamp) -> Self {
        self.expiry_at = Some(expiry_at);
        self
    }

    pub fn joined(mut self, joined: bool) -> Self {
        self.joined = Some(joined);
        self
    }

    pub fn departed_at(mut self, departed_at: Option<Timestamp>) -> Self {
        self.departed_at = Some(departed_at);
        self
    }

    /// Applies the patch to a record in place.
    pub fn apply_to(&self, record: &mut SubscriberRecord) {
        if let Some(id) = self.platform_id {
            record.platform_id = id;
        }
        if let Some(name) = &self.display_name {
            record.display_name = name.clone();
        }
        if let Some(token) = &self.invite_token {
            record.invite_token = token.clone();
        }
        if let Some(consumed) = self.invite_consumed {
            record.invite_consumed = consumed;
        }
        if let Some(expiry_at) = self.expiry_at {
            record.expiry_at = expiry_at;
        }
        if let Some(joined) = self.joined {
            record.joined = joined;
        }
        if let Some(departed_at) = self.departed_at {
            record.departed_at = departed_at;
        }
        record.updated_at = self.updated_at;
    }
}

/// Repository port for subscriber records.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Find a record by its phone number.
    async fn find_by_identity(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<SubscriberRecord>, DomainError>;

    /// Find the record currently holding `token`.
    async fn find_by_token(
        &self,
        token: &InviteToken,
    ) -> Result<Option<SubscriberRecord>, DomainError>;

    /// Find a record by platform identity.
    async fn find_by_platform_id(
        &self,
        platform_id: PlatformUserId,
    ) -> Result<Option<SubscriberRecord>, DomainError>;

    /// All records with `expiry_at < now`, regardless of state.
    async fn find_expired(&self, now: Timestamp) -> Result<Vec<SubscriberRecord>, DomainError>;

    /// Every record, ordered by creation time.
    async fn list_all(&self) -> Result<Vec<SubscriberRecord>, DomainError>;

    /// Create the record unless one already exists for its phone.
    ///
    /// Returns `false` when a record already existed; nothing is written.
    async fn insert_new(&self, record: &SubscriberRecord) -> Result<bool, DomainError>;

    /// Insert or fully replace the record for its phone.
    async fn upsert(&self, record: &SubscriberRecord) -> Result<(), DomainError>;

    /// Atomically apply `patch` if the record for `phone` satisfies
    /// `predicate`.
    ///
    /// Returns the updated record, or `None` if no record matched.
    async fn conditional_update(
        &self,
        phone: &PhoneNumber,
        predicate: &RecordPredicate,
        patch: &RecordPatch,
    ) -> Result<Option<SubscriberRecord>, DomainError>;

    /// Delete the record for `phone`. Returns `false` if it did not exist.
    async fn delete(&self, phone: &PhoneNumber) -> Result<bool, DomainError>;

    /// Delete the record for `phone` only if it satisfies `predicate`.
    async fn delete_where(
        &self,
        phone: &PhoneNumber,
        predicate: &RecordPredicate,
    ) -> Result<bool, DomainError>;

    /// Append one lifecycle entry. History is never updated or deleted, and
    /// outlives the record it describes.
    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), DomainError>;

    /// Every history entry for `phone`, oldest first.
    async fn history_for(&self, phone: &PhoneNumber) -> Result<Vec<HistoryEntry>, DomainError>;
}

/// Cross-process exclusion for the expiry sweep.
///
/// At most one holder at a time. `release` must be called by whoever
/// acquired the lock.
#[async_trait]
pub trait SweepLock: Send + Sync {
    /// Try to take the lock without waiting. Returns `false` if held elsewhere.
    async fn try_acquire(&self) -> Result<bool, DomainError>;

    async fn release(&self) -> Result<(), DomainError>;
}
