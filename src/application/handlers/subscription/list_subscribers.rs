//! ListSubscribersHandler - admin listing of every subscriber.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::subscription::{SubscriberRecord, SubscriptionError};
use crate::ports::SubscriptionStore;

/// Subscribers split by group membership.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberListing {
    pub joined_count: usize,
    pub pending_count: usize,
    pub joined: Vec<SubscriberRecord>,
    /// Everyone not currently in the group, departed subscribers included.
    pub pending: Vec<SubscriberRecord>,
}

pub struct ListSubscribersHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl ListSubscribersHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self) -> Result<SubscriberListing, SubscriptionError> {
        let (joined, pending): (Vec<_>, Vec<_>) = self
            .store
            .list_all()
            .await?
            .into_iter()
            .partition(|record| record.joined);

        Ok(SubscriberListing {
            joined_count: joined.len(),
            pending_count: pending.len(),
            joined,
            pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::subscription::test_support::*;

    #[tokio::test]
    async fn splits_joined_from_pending() {
        let fx = Fixture::new();
        fx.seed("T1", 7, true, false, Some(42)).await;

        let listing = ListSubscribersHandler::new(Arc::new(fx.store.clone()))
            .handle()
            .await
            .unwrap();

        assert_eq!(listing.joined_count, 1);
        assert_eq!(listing.pending_count, 0);
        assert_eq!(listing.joined[0].phone.as_str(), PHONE);
    }

    #[tokio::test]
    async fn departed_subscriber_is_listed_as_pending() {
        let fx = Fixture::new();
        fx.seed("T1", 7, false, true, Some(42)).await;

        let listing = ListSubscribersHandler::new(Arc::new(fx.store.clone()))
            .handle()
            .await
            .unwrap();

        assert_eq!(listing.joined_count, 0);
        assert_eq!(listing.pending_count, 1);
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let fx = Fixture::new();
        let listing = ListSubscribersHandler::new(Arc::new(fx.store.clone()))
            .handle()
            .await
            .unwrap();

        assert!(listing.joined.is_empty());
        assert!(listing.pending.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_surfaced() {
        let result = ListSubscribersHandler::new(Arc::new(FailingStore)).handle().await;
        assert!(matches!(result, Err(SubscriptionError::StoreUnavailable(_))));
    }
}
