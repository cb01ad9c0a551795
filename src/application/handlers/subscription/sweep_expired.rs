//! SweepExpiredHandler - one scan-and-evict pass over lapsed subscriptions.
//!
//! Level-triggered: every record with `expiry_at < now` is evicted from the
//! group and deleted. A record whose eviction failed is kept and picked up
//! again by the next pass. Passes never overlap, within the process (mutex)
//! or across processes (`SweepLock`).
//!
//! Each record is read again right before its eviction, so a renewal that
//! lands after the scan is honoured. A renewal that lands after the member
//! was removed leaves them out of the group with a fresh invite.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::application::{record_history, InviteIssuer, SubscriberNotifier};
use crate::domain::foundation::{StateMachine, Timestamp};
use crate::domain::subscription::{
    HistoryKind, SubscriberRecord, SubscriptionError, SubscriptionState,
};
use crate::ports::{
    Clock, MembershipPlatform, RecordPatch, RecordPredicate, SubscriptionStore, SweepLock,
};

/// Summary of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Result of asking for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was already running; nothing was done.
    Skipped,
}

enum RecordOutcome {
    Removed,
    /// Extended while the sweep was running.
    Kept,
}

pub struct SweepExpiredHandler {
    store: Arc<dyn SubscriptionStore>,
    platform: Arc<dyn MembershipPlatform>,
    issuer: InviteIssuer,
    notifier: SubscriberNotifier,
    lock: Arc<dyn SweepLock>,
    running: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl SweepExpiredHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        platform: Arc<dyn MembershipPlatform>,
        issuer: InviteIssuer,
        notifier: SubscriberNotifier,
        lock: Arc<dyn SweepLock>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            platform,
            issuer,
            notifier,
            lock,
            running: Mutex::new(()),
            clock,
        }
    }

    /// Run one pass unless another is in progress.
    pub async fn handle(&self) -> Result<SweepOutcome, SubscriptionError> {
        let Ok(_running) = self.running.try_lock() else {
            tracing::debug!("sweep already running in this process");
            return Ok(SweepOutcome::Skipped);
        };
        if !self.lock.try_acquire().await? {
            tracing::debug!("sweep lock held by another process");
            return Ok(SweepOutcome::Skipped);
        }

        let result = self.sweep().await;

        if let Err(e) = self.lock.release().await {
            tracing::warn!(error = %e, "failed to release sweep lock");
        }
        result.map(SweepOutcome::Completed)
    }

    async fn sweep(&self) -> Result<SweepReport, SubscriptionError> {
        let now = self.clock.now();
        let expired = self.store.find_expired(now).await?;
        let mut report = SweepReport {
            examined: expired.len(),
            ..SweepReport::default()
        };

        for record in expired {
            match self.evict(&record, now).await {
                Ok(RecordOutcome::Removed) => report.removed += 1,
                Ok(RecordOutcome::Kept) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        phone = %record.phone,
                        platform_user_id = ?record.platform_id,
                        error = %e,
                        "failed to evict expired subscriber"
                    );
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            removed = report.removed,
            failed = report.failed,
            "expiry sweep finished"
        );
        Ok(report)
    }

    async fn evict(
        &self,
        scanned: &SubscriberRecord,
        now: Timestamp,
    ) -> Result<RecordOutcome, SubscriptionError> {
        scanned
            .state(now)
            .transition_to(SubscriptionState::Removed)?;

        let Some(record) = self
            .store
            .find_by_identity(&scanned.phone)
            .await?
            .filter(|current| current.is_expired(now))
        else {
            tracing::info!(phone = %scanned.phone, "subscription renewed before eviction, record kept");
            return Ok(RecordOutcome::Kept);
        };

        if let Some(user) = record.platform_id {
            self.platform
                .remove_member(self.issuer.group(), user)
                .await?;
        }
        if let Some(token) = record.invite_token.as_ref().filter(|_| !record.invite_consumed) {
            self.issuer.revoke(token).await;
        }

        let predicate = RecordPredicate::any().expired_before(now);
        if self.store.delete_where(&record.phone, &predicate).await? {
            record_history(self.store.as_ref(), HistoryKind::Removed, &record, now).await;
            return Ok(RecordOutcome::Removed);
        }

        // Renewed after the member was removed; the record must say so.
        tracing::info!(phone = %record.phone, "subscription renewed during eviction, record kept");
        if record.platform_id.is_some() {
            let patch = RecordPatch::at(now).joined(false).departed_at(Some(now));
            let departed = self
                .store
                .conditional_update(&record.phone, &RecordPredicate::any().joined(true), &patch)
                .await?;
            if let Some(departed) = departed {
                record_history(self.store.as_ref(), HistoryKind::Departed, &departed, now).await;
                self.reinvite(departed, now).await;
            }
        }
        Ok(RecordOutcome::Kept)
    }

    /// Give a subscriber removed despite a renewal a way back in.
    ///
    /// Failures are logged only; the subscriber can still ask for a new invite.
    async fn reinvite(&self, record: SubscriberRecord, now: Timestamp) {
        let live = record.invite_token.as_ref().filter(|_| !record.invite_consumed);
        let token = match self.issuer.reissue(live).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(phone = %record.phone, error = %e, "failed to reissue invite after eviction");
                return;
            }
        };

        let predicate = RecordPredicate::any()
            .joined(false)
            .invite_token(record.invite_token.clone());
        let patch = RecordPatch::at(now)
            .invite_token(Some(token.clone()))
            .invite_consumed(false);
        let updated = match self
            .store
            .conditional_update(&record.phone, &predicate, &patch)
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                self.issuer.revoke(&token).await;
                tracing::debug!(phone = %record.phone, "record changed before reissue after eviction");
                return;
            }
            Err(e) => {
                self.issuer.revoke(&token).await;
                tracing::warn!(phone = %record.phone, error = %e, "failed to store invite after eviction");
                return;
            }
        };

        record_history(self.store.as_ref(), HistoryKind::InviteReissued, &updated, now).await;
        self.notifier
            .invite(updated.platform_id, &token, updated.expiry_at)
            .await;
    }
}
