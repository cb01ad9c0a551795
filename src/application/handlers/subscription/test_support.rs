//! Shared fixtures for subscription handler tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::memory::{InMemorySubscriptionStore, ManualClock};
use crate::adapters::telegram::MockMembershipPlatform;
use crate::application::{InviteIssuer, SubscriberNotifier};
use crate::domain::foundation::{DomainError, GroupId, PlatformUserId, Timestamp};
use crate::domain::subscription::{
    HistoryEntry, HistoryKind, InviteToken, PhoneNumber, SubscriberRecord,
};
use crate::ports::{RecordPatch, RecordPredicate, SubscriptionStore};

pub const GROUP: i64 = -1001234567890;
pub const PHONE: &str = "+15550001111";

pub struct Fixture {
    pub store: InMemorySubscriptionStore,
    pub platform: MockMembershipPlatform,
    pub clock: Arc<ManualClock>,
    pub start: Timestamp,
}

impl Fixture {
    pub fn new() -> Self {
        let start = Timestamp::now();
        Self {
            store: InMemorySubscriptionStore::new(),
            platform: MockMembershipPlatform::new(),
            clock: Arc::new(ManualClock::new(start)),
            start,
        }
    }

    pub fn group(&self) -> GroupId {
        GroupId::new(GROUP)
    }

    pub fn issuer(&self) -> InviteIssuer {
        InviteIssuer::new(
            Arc::new(self.platform.clone()),
            self.group(),
            Duration::from_secs(7 * 86_400),
        )
    }

    pub fn notifier(&self) -> SubscriberNotifier {
        SubscriberNotifier::new(Arc::new(self.platform.clone()), None)
    }

    /// Store a record for `PHONE` in the given shape.
    pub async fn seed(
        &self,
        token: &str,
        expires_in_days: i64,
        joined: bool,
        departed: bool,
        platform_id: Option<i64>,
    ) -> SubscriberRecord {
        let mut record = SubscriberRecord::new_pending(
            phone(),
            InviteToken::new(token).unwrap(),
            self.start.add_days(expires_in_days),
            self.start,
        );
        record.joined = joined;
        record.invite_consumed = joined || departed;
        record.departed_at = departed.then_some(self.start);
        record.platform_id = platform_id.map(PlatformUserId::new);
        self.store.upsert(&record).await.unwrap();
        record
    }

    pub async fn stored(&self) -> Option<SubscriberRecord> {
        self.store.find_by_identity(&phone()).await.unwrap()
    }

    /// Kinds of the history entries for `PHONE`, oldest first.
    pub async fn history(&self) -> Vec<HistoryKind> {
        self.store
            .history_for(&phone())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }
}

pub fn phone() -> PhoneNumber {
    PhoneNumber::parse(PHONE).unwrap()
}

/// Store whose every call fails as if the database were down.
pub struct FailingStore;

fn down() -> DomainError {
    DomainError::database("connection refused")
}

#[async_trait]
impl SubscriptionStore for FailingStore {
    async fn find_by_identity(
        &self,
        _phone: &PhoneNumber,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        Err(down())
    }

    async fn find_by_token(
        &self,
        _token: &InviteToken,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        Err(down())
    }

    async fn find_by_platform_id(
        &self,
        _platform_id: PlatformUserId,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        Err(down())
    }

    async fn find_expired(&self, _now: Timestamp) -> Result<Vec<SubscriberRecord>, DomainError> {
        Err(down())
    }

    async fn list_all(&self) -> Result<Vec<SubscriberRecord>, DomainError> {
        Err(down())
    }

    async fn insert_new(&self, _record: &SubscriberRecord) -> Result<bool, DomainError> {
        Err(down())
    }

    async fn upsert(&self, _record: &SubscriberRecord) -> Result<(), DomainError> {
        Err(down())
    }

    async fn conditional_update(
        &self,
        _phone: &PhoneNumber,
        _predicate: &RecordPredicate,
        _patch: &RecordPatch,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        Err(down())
    }

    async fn delete(&self, _phone: &PhoneNumber) -> Result<bool, DomainError> {
        Err(down())
    }

    async fn delete_where(
        &self,
        _phone: &PhoneNumber,
        _predicate: &RecordPredicate,
    ) -> Result<bool, DomainError> {
        Err(down())
    }

    async fn append_history(&self, _entry: &HistoryEntry) -> Result<(), DomainError> {
        Err(down())
    }

    async fn history_for(&self, _phone: &PhoneNumber) -> Result<Vec<HistoryEntry>, DomainError> {
        Err(down())
    }
}

/// In-memory store with injectable faults.
///
/// Writes go to the wrapped store. Reads can be pinned to an old snapshot to
/// model a handler that looked the record up before a concurrent writer
/// changed it.
pub struct FaultyStore {
    inner: InMemorySubscriptionStore,
    fail_inserts: bool,
    fail_conditional_updates: bool,
    stale_by_token: Option<SubscriberRecord>,
    stale_by_identity: Option<SubscriberRecord>,
    stale_expired: Option<SubscriberRecord>,
}

impl FaultyStore {
    pub fn new(inner: InMemorySubscriptionStore) -> Self {
        Self {
            inner,
            fail_inserts: false,
            fail_conditional_updates: false,
            stale_by_token: None,
            stale_by_identity: None,
            stale_expired: None,
        }
    }

    pub fn failing_inserts(mut self) -> Self {
        self.fail_inserts = true;
        self
    }

    pub fn failing_conditional_updates(mut self) -> Self {
        self.fail_conditional_updates = true;
        self
    }

    /// `find_by_token` returns `snapshot` whatever the store holds.
    pub fn stale_by_token(mut self, snapshot: SubscriberRecord) -> Self {
        self.stale_by_token = Some(snapshot);
        self
    }

    /// `find_by_identity` returns `snapshot` whatever the store holds.
    pub fn stale_by_identity(mut self, snapshot: SubscriberRecord) -> Self {
        self.stale_by_identity = Some(snapshot);
        self
    }

    /// `find_expired` returns only `snapshot` whatever the store holds.
    pub fn stale_expired(mut self, snapshot: SubscriberRecord) -> Self {
        self.stale_expired = Some(snapshot);
        self
    }
}

#[async_trait]
impl SubscriptionStore for FaultyStore {
    async fn find_by_identity(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        match &self.stale_by_identity {
            Some(snapshot) => Ok(Some(snapshot.clone())),
            None => self.inner.find_by_identity(phone).await,
        }
    }

    async fn find_by_token(
        &self,
        token: &InviteToken,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        match &self.stale_by_token {
            Some(snapshot) => Ok(Some(snapshot.clone())),
            None => self.inner.find_by_token(token).await,
        }
    }

    async fn find_by_platform_id(
        &self,
        platform_id: PlatformUserId,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        self.inner.find_by_platform_id(platform_id).await
    }

    async fn find_expired(&self, now: Timestamp) -> Result<Vec<SubscriberRecord>, DomainError> {
        match &self.stale_expired {
            Some(snapshot) => Ok(vec![snapshot.clone()]),
            None => self.inner.find_expired(now).await,
        }
    }

    async fn list_all(&self) -> Result<Vec<SubscriberRecord>, DomainError> {
        self.inner.list_all().await
    }

    async fn insert_new(&self, record: &SubscriberRecord) -> Result<bool, DomainError> {
        if self.fail_inserts {
            return Err(down());
        }
        self.inner.insert_new(record).await
    }

    async fn upsert(&self, record: &SubscriberRecord) -> Result<(), DomainError> {
        self.inner.upsert(record).await
    }

    async fn conditional_update(
        &self,
        phone: &PhoneNumber,
        predicate: &RecordPredicate,
        patch: &RecordPatch,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        if self.fail_conditional_updates {
            return Err(down());
        }
        self.inner.conditional_update(phone, predicate, patch).await
    }

    async fn delete(&self, phone: &PhoneNumber) -> Result<bool, DomainError> {
        self.inner.delete(phone).await
    }

    async fn delete_where(
        &self,
        phone: &PhoneNumber,
        predicate: &RecordPredicate,
    ) -> Result<bool, DomainError> {
        self.inner.delete_where(phone, predicate).await
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), DomainError> {
        self.inner.append_history(entry).await
    }

    async fn history_for(&self, phone: &PhoneNumber) -> Result<Vec<HistoryEntry>, DomainError> {
        self.inner.history_for(phone).await
    }
}
