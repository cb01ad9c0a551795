//! SubscriberHistoryHandler - admin view of one subscriber's lifecycle.

use std::sync::Arc;

use crate::domain::subscription::{HistoryEntry, PhoneNumber, SubscriptionError};
use crate::ports::SubscriptionStore;

#[derive(Debug, Clone)]
pub struct SubscriberHistoryQuery {
    pub phone: String,
}

pub struct SubscriberHistoryHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriberHistoryHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Entries oldest first. Empty when the phone was never subscribed.
    pub async fn handle(
        &self,
        query: SubscriberHistoryQuery,
    ) -> Result<Vec<HistoryEntry>, SubscriptionError> {
        let phone = PhoneNumber::parse(&query.phone)?;
        Ok(self.store.history_for(&phone).await?)
    }
}
