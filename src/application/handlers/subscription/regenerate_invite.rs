//! RegenerateInviteHandler - fresh invite for a departed subscriber.
//!
//! Only valid while the record shows the subscriber left the group and the
//! subscription has not expired. Can be repeated until they rejoin; each call
//! revokes the invite before it.

use std::sync::Arc;

use crate::application::{record_history, BestEffort, InviteIssuer, SubscriberNotifier};
use crate::domain::subscription::{HistoryKind, PhoneNumber, SubscriberRecord, SubscriptionError};
use crate::ports::{Clock, RecordPatch, RecordPredicate, SubscriptionStore};

#[derive(Debug, Clone)]
pub struct RegenerateInviteCommand {
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct RegenerateInviteResult {
    pub record: SubscriberRecord,
    pub notification: BestEffort,
}

pub struct RegenerateInviteHandler {
    store: Arc<dyn SubscriptionStore>,
    issuer: InviteIssuer,
    notifier: SubscriberNotifier,
    clock: Arc<dyn Clock>,
}

impl RegenerateInviteHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        issuer: InviteIssuer,
        notifier: SubscriberNotifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            issuer,
            notifier,
            clock,
        }
    }

    pub async fn handle(
        &self,
        cmd: RegenerateInviteCommand,
    ) -> Result<RegenerateInviteResult, SubscriptionError> {
        let phone = PhoneNumber::parse(&cmd.phone)?;
        let now = self.clock.now();

        let current = self
            .store
            .find_by_identity(&phone)
            .await?
            .ok_or_else(|| SubscriptionError::not_found(phone.as_str()))?;

        if !current.can_regenerate(now) {
            return Err(SubscriptionError::invalid_state(
                current.state(now).as_str(),
                "regenerate invite for",
            ));
        }

        let token = self.issuer.reissue(current.invite_token.as_ref()).await?;

        let predicate = RecordPredicate::any()
            .joined(false)
            .departed(true)
            .invite_token(current.invite_token.clone())
            .expiry_at(current.expiry_at);
        let patch = RecordPatch::at(now)
            .invite_token(Some(token.clone()))
            .invite_consumed(false);

        let updated = match self
            .store
            .conditional_update(&phone, &predicate, &patch)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                self.issuer.revoke(&token).await;
                return Err(e.into());
            }
        };
        let Some(record) = updated else {
            // Admitted, extended or regenerated concurrently.
            self.issuer.revoke(&token).await;
            return Err(SubscriptionError::invalid_state(
                "concurrently modified",
                "regenerate invite for",
            ));
        };

        tracing::info!(phone = %record.phone, "invite regenerated after departure");
        record_history(self.store.as_ref(), HistoryKind::InviteReissued, &record, now).await;

        let notification = self
            .notifier
            .invite(record.platform_id, &token, record.expiry_at)
            .await;

        Ok(RegenerateInviteResult {
            record,
            notification,
        })
    }
}
