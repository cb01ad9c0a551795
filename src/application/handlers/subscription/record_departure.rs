//! RecordDepartureHandler - observes members leaving the managed group.
//!
//! Departure keeps the consumed invite and the expiry. A departed subscriber
//! whose subscription is still valid can ask for a fresh invite.

use std::sync::Arc;

use crate::application::record_history;
use crate::domain::foundation::{GroupId, StateMachine};
use crate::domain::subscription::{
    HistoryKind, MemberLeftOrRemoved, SubscriberRecord, SubscriptionError, SubscriptionState,
};
use crate::ports::{Clock, RecordPatch, RecordPredicate, SubscriptionStore};

/// Outcome of a membership-change observation.
#[derive(Debug, Clone, PartialEq)]
pub enum DepartureOutcome {
    Recorded(SubscriberRecord),
    /// No subscriber is bound to this platform user.
    Untracked,
    /// The subscriber was already marked as not joined.
    AlreadyDeparted,
    /// Event for a group this service does not manage.
    Ignored,
}

pub struct RecordDepartureHandler {
    store: Arc<dyn SubscriptionStore>,
    group: GroupId,
    clock: Arc<dyn Clock>,
}

impl RecordDepartureHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, group: GroupId, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            group,
            clock,
        }
    }

    pub async fn handle(
        &self,
        event: MemberLeftOrRemoved,
    ) -> Result<DepartureOutcome, SubscriptionError> {
        if event.group_id != self.group {
            return Ok(DepartureOutcome::Ignored);
        }

        let Some(current) = self
            .store
            .find_by_platform_id(event.platform_user_id)
            .await?
        else {
            tracing::debug!(
                platform_user_id = %event.platform_user_id,
                "departure of untracked member"
            );
            return Ok(DepartureOutcome::Untracked);
        };

        let now = self.clock.now();
        let state = current.state(now);
        if state == SubscriptionState::Active {
            state.transition_to(SubscriptionState::Departed)?;
        }

        let predicate = RecordPredicate::any().joined(true);
        let patch = RecordPatch::at(now).joined(false).departed_at(Some(now));

        match self
            .store
            .conditional_update(&current.phone, &predicate, &patch)
            .await?
        {
            Some(record) => {
                tracing::info!(
                    phone = %record.phone,
                    platform_user_id = %event.platform_user_id,
                    "departure recorded"
                );
                record_history(self.store.as_ref(), HistoryKind::Departed, &record, now).await;
                Ok(DepartureOutcome::Recorded(record))
            }
            None => Ok(DepartureOutcome::AlreadyDeparted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::subscription::test_support::*;
    use crate::domain::foundation::PlatformUserId;

    fn handler(fx: &Fixture) -> RecordDepartureHandler {
        RecordDepartureHandler::new(Arc::new(fx.store.clone()), fx.group(), fx.clock.clone())
    }

    fn left(user: i64) -> MemberLeftOrRemoved {
        MemberLeftOrRemoved {
            group_id: GroupId::new(GROUP),
            platform_user_id: PlatformUserId::new(user),
        }
    }

    #[tokio::test]
    async fn marks_joined_member_departed_keeping_invite_and_expiry() {
        let fx = Fixture::new();
        let seeded = fx.seed("T1", 7, true, false, Some(42)).await;
        fx.clock.advance_days(1);

        let outcome = handler(&fx).handle(left(42)).await.unwrap();

        let DepartureOutcome::Recorded(record) = outcome else {
            panic!("expected departure to be recorded");
        };
        assert!(!record.joined);
        assert!(record.invite_consumed);
        assert_eq!(record.invite_token, seeded.invite_token);
        assert_eq!(record.expiry_at, seeded.expiry_at);
        assert_eq!(record.departed_at, Some(fx.start.add_days(1)));
        assert_eq!(record.state(fx.start.add_days(1)), SubscriptionState::Departed);
    }

    #[tokio::test]
    async fn second_departure_is_noop() {
        let fx = Fixture::new();
        fx.seed("T1", 7, true, false, Some(42)).await;
        let handler = handler(&fx);

        handler.handle(left(42)).await.unwrap();
        let again = handler.handle(left(42)).await.unwrap();

        assert_eq!(again, DepartureOutcome::AlreadyDeparted);
        assert_eq!(fx.history().await, vec![HistoryKind::Departed]);
    }

    #[tokio::test]
    async fn expired_member_departure_is_recorded() {
        let fx = Fixture::new();
        fx.seed("T1", -1, true, false, Some(42)).await;

        let outcome = handler(&fx).handle(left(42)).await.unwrap();

        assert!(matches!(outcome, DepartureOutcome::Recorded(_)));
        assert!(!fx.stored().await.unwrap().joined);
    }

    #[tokio::test]
    async fn unknown_member_is_untracked() {
        let fx = Fixture::new();
        let outcome = handler(&fx).handle(left(7)).await.unwrap();
        assert_eq!(outcome, DepartureOutcome::Untracked);
    }

    #[tokio::test]
    async fn other_group_is_ignored() {
        let fx = Fixture::new();
        fx.seed("T1", 7, true, false, Some(42)).await;
        let mut event = left(42);
        event.group_id = GroupId::new(-5);

        let outcome = handler(&fx).handle(event).await.unwrap();

        assert_eq!(outcome, DepartureOutcome::Ignored);
        assert!(fx.stored().await.unwrap().joined);
    }

    #[tokio::test]
    async fn store_failure_is_surfaced() {
        let fx = Fixture::new();
        let handler = RecordDepartureHandler::new(Arc::new(FailingStore), fx.group(), fx.clock.clone());

        let result = handler.handle(left(42)).await;
        assert!(matches!(result, Err(SubscriptionError::StoreUnavailable(_))));
    }
}
