//! ExtendSubscriptionHandler - Command handler for renewing a subscription.
//!
//! New expiry is `max(current expiry, now) + extra_days`. A subscriber who is
//! not currently in the group also gets a fresh invite, since the previous
//! one may already be used, expired or declined.
//!
//! Extending an identity with no record starts a subscription of
//! `extra_days`, the same way subscribe does.

use std::sync::Arc;

use crate::application::{record_history, BestEffort, InviteIssuer, SubscriberNotifier};
use crate::domain::foundation::ValidationError;
use crate::domain::subscription::{
    HistoryKind, InviteToken, PhoneNumber, SubscriberRecord, SubscriptionError,
};
use crate::ports::{Clock, RecordPatch, RecordPredicate, SubscriptionStore};

use super::subscribe::{SubscribeHandler, MAX_DURATION_DAYS};

/// Attempts before a concurrently modified record is reported as a conflict.
const MAX_ATTEMPTS: usize = 3;

/// Command to extend a subscription.
#[derive(Debug, Clone)]
pub struct ExtendSubscriptionCommand {
    pub phone: String,
    pub extra_days: i64,
}

/// Result of a successful extension.
#[derive(Debug, Clone)]
pub struct ExtendSubscriptionResult {
    pub record: SubscriberRecord,
    /// Invite issued because the subscriber was not in the group.
    pub new_invite: Option<InviteToken>,
    pub notification: BestEffort,
    /// No record existed, so a new subscription was started.
    pub created: bool,
}

/// Handler for extending subscriptions.
pub struct ExtendSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
    subscribe: Arc<SubscribeHandler>,
    issuer: InviteIssuer,
    notifier: SubscriberNotifier,
    clock: Arc<dyn Clock>,
}

impl ExtendSubscriptionHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        subscribe: Arc<SubscribeHandler>,
        issuer: InviteIssuer,
        notifier: SubscriberNotifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            subscribe,
            issuer,
            notifier,
            clock,
        }
    }

    pub async fn handle(
        &self,
        cmd: ExtendSubscriptionCommand,
    ) -> Result<ExtendSubscriptionResult, SubscriptionError> {
        if !(1..=MAX_DURATION_DAYS).contains(&cmd.extra_days) {
            return Err(ValidationError::out_of_range(
                "extra_days",
                1,
                MAX_DURATION_DAYS,
                cmd.extra_days,
            )
            .into());
        }
        let phone = PhoneNumber::parse(&cmd.phone)?;

        for _ in 0..MAX_ATTEMPTS {
            let now = self.clock.now();
            let Some(current) = self.store.find_by_identity(&phone).await? else {
                match self.subscribe.create(phone.clone(), cmd.extra_days, now).await {
                    Ok(started) => {
                        return Ok(ExtendSubscriptionResult {
                            new_invite: started.record.invite_token.clone(),
                            record: started.record,
                            notification: started.notification,
                            created: true,
                        })
                    }
                    // Created concurrently; extend that record instead.
                    Err(SubscriptionError::AlreadyPending(_))
                    | Err(SubscriptionError::AlreadyMember(_)) => continue,
                    Err(e) => return Err(e),
                }
            };

            let new_expiry = current.extended_expiry(cmd.extra_days, now);
            let new_invite = if current.joined {
                None
            } else {
                Some(self.issuer.reissue(current.invite_token.as_ref()).await?)
            };

            // Compare-and-set on everything the new values were derived from.
            let predicate = RecordPredicate::any()
                .joined(current.joined)
                .invite_token(current.invite_token.clone())
                .expiry_at(current.expiry_at);
            let mut patch = RecordPatch::at(now).expiry_at(new_expiry);
            if let Some(token) = &new_invite {
                patch = patch.invite_token(Some(token.clone())).invite_consumed(false);
            }

            let updated = match self
                .store
                .conditional_update(&phone, &predicate, &patch)
                .await
            {
                Ok(updated) => updated,
                Err(e) => {
                    if let Some(token) = &new_invite {
                        self.issuer.revoke(token).await;
                    }
                    return Err(e.into());
                }
            };

            let Some(record) = updated else {
                if let Some(token) = &new_invite {
                    self.issuer.revoke(token).await;
                }
                tracing::debug!(phone = %phone, "record changed during extend, retrying");
                continue;
            };

            tracing::info!(
                phone = %record.phone,
                expiry_at = %record.expiry_at,
                reissued = new_invite.is_some(),
                "subscription extended"
            );
            record_history(self.store.as_ref(), HistoryKind::Extended, &record, now).await;

            let recipient = self.notifier.recipient(record.platform_id, &record.phone).await;
            let notification = self
                .notifier
                .extended(recipient, record.expiry_at, new_invite.as_ref())
                .await;

            return Ok(ExtendSubscriptionResult {
                record,
                new_invite,
                notification,
                created: false,
            });
        }

        Err(SubscriptionError::invalid_state("concurrently modified", "extend"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::subscription::test_support::*;
    use crate::ports::PlatformError;

    fn handler(fx: &Fixture) -> ExtendSubscriptionHandler {
        handler_with_store(fx, Arc::new(fx.store.clone()))
    }

    fn handler_with_store(
        fx: &Fixture,
        store: Arc<dyn SubscriptionStore>,
    ) -> ExtendSubscriptionHandler {
        let subscribe = SubscribeHandler::new(
            store.clone(),
            Arc::new(fx.platform.clone()),
            fx.issuer(),
            fx.notifier(),
            fx.clock.clone(),
        );
        ExtendSubscriptionHandler::new(
            store,
            Arc::new(subscribe),
            fx.issuer(),
            fx.notifier(),
            fx.clock.clone(),
        )
    }

    fn cmd(days: i64) -> ExtendSubscriptionCommand {
        ExtendSubscriptionCommand {
            phone: PHONE.to_string(),
            extra_days: days,
        }
    }

    #[tokio::test]
    async fn adds_days_to_future_expiry_for_joined_member() {
        let fx = Fixture::new();
        let seeded = fx.seed("T0", 10, true, false, Some(42)).await;

        let result = handler(&fx).handle(cmd(5)).await.unwrap();

        assert_eq!(result.record.expiry_at, seeded.expiry_at.add_days(5));
        assert!(result.new_invite.is_none());
        assert!(!fx.platform.was_called("create_single_use_invite"));
        assert!(fx.platform.messages_to(42)[0].starts_with("Plan extended to"));
    }

    #[tokio::test]
    async fn clamps_base_to_now_for_lapsed_subscription() {
        let fx = Fixture::new();
        fx.seed("T0", -20, true, false, Some(42)).await;

        let result = handler(&fx).handle(cmd(5)).await.unwrap();

        assert_eq!(result.record.expiry_at, fx.start.add_days(5));
    }

    #[tokio::test]
    async fn reissues_invite_when_not_joined() {
        let fx = Fixture::new();
        fx.seed("OLD", 3, false, true, Some(42)).await;

        let result = handler(&fx).handle(cmd(30)).await.unwrap();

        let token = result.new_invite.unwrap();
        assert_eq!(token.as_str(), "T1");
        assert_eq!(result.record.invite_token, Some(token));
        assert!(!result.record.invite_consumed);
        assert_eq!(fx.platform.calls_to("revoke_invite")[0][1], "OLD");

        let sent = fx.platform.messages_to(42);
        assert!(sent[0].contains("T1"));
    }

    #[tokio::test]
    async fn resolves_recipient_when_platform_id_unknown() {
        let fx = Fixture::new();
        fx.platform.add_contact(PHONE, 55, None);
        fx.seed("OLD", 3, false, false, None).await;

        let result = handler(&fx).handle(cmd(1)).await.unwrap();

        assert!(result.notification.is_delivered());
        assert_eq!(fx.platform.messages_to(55).len(), 1);
    }

    #[tokio::test]
    async fn notification_failure_keeps_extension() {
        let fx = Fixture::new();
        let seeded = fx.seed("T0", 10, true, false, Some(42)).await;
        fx.platform
            .set_method_error("send_direct_message", PlatformError::Unavailable("502".into()));

        let result = handler(&fx).handle(cmd(5)).await.unwrap();

        assert!(matches!(result.notification, BestEffort::Failed(_)));
        assert_eq!(
            fx.stored().await.unwrap().expiry_at,
            seeded.expiry_at.add_days(5)
        );
    }

    #[tokio::test]
    async fn invite_failure_leaves_expiry_unchanged() {
        let fx = Fixture::new();
        let seeded = fx.seed("OLD", 3, false, true, Some(42)).await;
        fx.platform
            .set_method_error("create_single_use_invite", PlatformError::Timeout);

        let result = handler(&fx).handle(cmd(5)).await;

        assert!(matches!(result, Err(SubscriptionError::PlatformUnavailable(_))));
        assert_eq!(fx.stored().await.unwrap().expiry_at, seeded.expiry_at);
    }

    #[tokio::test]
    async fn unknown_identity_starts_new_subscription() {
        let fx = Fixture::new();
        fx.platform.add_contact(PHONE, 42, Some("Alice"));

        let result = handler(&fx).handle(cmd(5)).await.unwrap();

        assert!(result.created);
        assert_eq!(result.record.expiry_at, fx.start.add_days(5));
        assert!(!result.record.joined);
        assert_eq!(result.new_invite.as_ref().unwrap().as_str(), "T1");
        assert!(result.notification.is_delivered());
        assert_eq!(fx.stored().await, Some(result.record));
        assert_eq!(fx.history().await, vec![HistoryKind::Subscribed]);
    }

    #[tokio::test]
    async fn unknown_unresolvable_identity_is_rejected() {
        let fx = Fixture::new();

        let result = handler(&fx).handle(cmd(5)).await;

        assert!(matches!(result, Err(SubscriptionError::IdentityNotResolvable(_))));
        assert!(fx.stored().await.is_none());
    }

    #[tokio::test]
    async fn extension_is_recorded_in_history() {
        let fx = Fixture::new();
        fx.seed("T0", 10, true, false, Some(42)).await;

        let result = handler(&fx).handle(cmd(5)).await.unwrap();

        assert!(!result.created);
        assert_eq!(fx.history().await, vec![HistoryKind::Extended]);
        let entries = fx.store.history_for(&phone()).await.unwrap();
        assert_eq!(entries[0].expiry_at, result.record.expiry_at);
    }

    #[tokio::test]
    async fn rejects_non_positive_days() {
        let fx = Fixture::new();
        fx.seed("T0", 10, true, false, Some(42)).await;

        let result = handler(&fx).handle(cmd(0)).await;
        assert!(matches!(
            result,
            Err(SubscriptionError::InvalidInput { ref field, .. }) if field == "extra_days"
        ));
    }

    #[tokio::test]
    async fn store_failure_is_surfaced() {
        let fx = Fixture::new();
        let handler = handler_with_store(&fx, Arc::new(FailingStore));

        let result = handler.handle(cmd(5)).await;
        assert!(matches!(result, Err(SubscriptionError::StoreUnavailable(_))));
    }
}
