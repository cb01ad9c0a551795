//! In-memory subscription store.
//!
//! Same semantics as the Postgres store, including atomic conditional
//! updates: every mutation runs under one write lock. Used by tests and
//! local runs without a database.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, PlatformUserId, Timestamp};
use crate::domain::subscription::{HistoryEntry, InviteToken, PhoneNumber, SubscriberRecord};
use crate::ports::{RecordPatch, RecordPredicate, SubscriptionStore, SweepLock};

/// In-memory storage for subscriber records, keyed by phone, plus their
/// append-only history.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    records: Arc<RwLock<HashMap<PhoneNumber, SubscriberRecord>>>,
    history: Arc<RwLock<Vec<HistoryEntry>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn find_by_identity(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        Ok(self.records.read().await.get(phone).cloned())
    }

    async fn find_by_token(
        &self,
        token: &InviteToken,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.invite_token.as_ref() == Some(token))
            .cloned())
    }

    async fn find_by_platform_id(
        &self,
        platform_id: PlatformUserId,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.platform_id == Some(platform_id))
            .cloned())
    }

    async fn find_expired(&self, now: Timestamp) -> Result<Vec<SubscriberRecord>, DomainError> {
        let records = self.records.read().await;
        let mut expired: Vec<_> = records
            .values()
            .filter(|r| r.is_expired(now))
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.expiry_at);
        Ok(expired)
    }

    async fn list_all(&self) -> Result<Vec<SubscriberRecord>, DomainError> {
        let records = self.records.read().await;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        Ok(all)
    }

    async fn insert_new(&self, record: &SubscriberRecord) -> Result<bool, DomainError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.phone) {
            return Ok(false);
        }
        records.insert(record.phone.clone(), record.clone());
        Ok(true)
    }

    async fn upsert(&self, record: &SubscriberRecord) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        records.insert(record.phone.clone(), record.clone());
        Ok(())
    }

    async fn conditional_update(
        &self,
        phone: &PhoneNumber,
        predicate: &RecordPredicate,
        patch: &RecordPatch,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        let mut records = self.records.write().await;
        match records.get_mut(phone) {
            Some(record) if predicate.matches(record) => {
                patch.apply_to(record);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, phone: &PhoneNumber) -> Result<bool, DomainError> {
        Ok(self.records.write().await.remove(phone).is_some())
    }

    async fn delete_where(
        &self,
        phone: &PhoneNumber,
        predicate: &RecordPredicate,
    ) -> Result<bool, DomainError> {
        let mut records = self.records.write().await;
        match records.get(phone) {
            Some(record) if predicate.matches(record) => {
                records.remove(phone);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), DomainError> {
        self.history.write().await.push(entry.clone());
        Ok(())
    }

    async fn history_for(&self, phone: &PhoneNumber) -> Result<Vec<HistoryEntry>, DomainError> {
        let history = self.history.read().await;
        Ok(history.iter().filter(|e| &e.phone == phone).cloned().collect())
    }
}

/// Process-local sweep lock.
#[derive(Debug, Default)]
pub struct InMemorySweepLock {
    held: AtomicBool,
}

impl InMemorySweepLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SweepLock for InMemorySweepLock {
    async fn try_acquire(&self) -> Result<bool, DomainError> {
        Ok(self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok())
    }

    async fn release(&self) -> Result<(), DomainError> {
        self.held.store(false, Ordering::Release);
        Ok(())
    }
}
