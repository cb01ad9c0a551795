//! Subscription history writes.
//!
//! History is appended after the record change it describes. A failed append
//! is logged and never undoes that change.

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{HistoryEntry, HistoryKind, SubscriberRecord};
use crate::ports::SubscriptionStore;

/// Append a history entry for `record`, logging instead of failing.
pub async fn record_history(
    store: &dyn SubscriptionStore,
    kind: HistoryKind,
    record: &SubscriberRecord,
    at: Timestamp,
) {
    let entry = HistoryEntry::of(kind, record, at);
    if let Err(e) = store.append_history(&entry).await {
        tracing::warn!(
            phone = %record.phone,
            kind = %kind,
            error = %e,
            "failed to append subscription history"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::domain::subscription::{InviteToken, PhoneNumber};

    #[tokio::test]
    async fn appends_entry_for_record() {
        let store = InMemorySubscriptionStore::new();
        let now = Timestamp::now();
        let record = SubscriberRecord::new_pending(
            PhoneNumber::parse("+15550001111").unwrap(),
            InviteToken::new("T1").unwrap(),
            now.add_days(7),
            now,
        );

        record_history(&store, HistoryKind::Subscribed, &record, now).await;

        let history = store.history_for(&record.phone).await.unwrap();
        assert_eq!(history, vec![HistoryEntry::of(HistoryKind::Subscribed, &record, now)]);
    }
}
