//! ForceRemoveHandler - admin eviction of one subscriber by platform id.

use std::sync::Arc;

use crate::application::record_history;
use crate::domain::foundation::{GroupId, PlatformUserId};
use crate::domain::subscription::{HistoryKind, SubscriberRecord, SubscriptionError};
use crate::ports::{Clock, MembershipPlatform, SubscriptionStore};

#[derive(Debug, Clone)]
pub struct ForceRemoveCommand {
    pub platform_id: i64,
}

pub struct ForceRemoveHandler {
    store: Arc<dyn SubscriptionStore>,
    platform: Arc<dyn MembershipPlatform>,
    group: GroupId,
    clock: Arc<dyn Clock>,
}

impl ForceRemoveHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        platform: Arc<dyn MembershipPlatform>,
        group: GroupId,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            platform,
            group,
            clock,
        }
    }

    /// Evict the member, then delete the record. Returns the deleted record.
    pub async fn handle(
        &self,
        cmd: ForceRemoveCommand,
    ) -> Result<SubscriberRecord, SubscriptionError> {
        let user = PlatformUserId::new(cmd.platform_id);
        let record = self
            .store
            .find_by_platform_id(user)
            .await?
            .ok_or_else(|| SubscriptionError::not_found(user.to_string()))?;

        self.platform.remove_member(self.group, user).await?;
        self.store.delete(&record.phone).await?;

        tracing::info!(
            phone = %record.phone,
            platform_user_id = %user,
            "subscriber force-removed"
        );
        record_history(self.store.as_ref(), HistoryKind::Removed, &record, self.clock.now()).await;
        Ok(record)
    }
}
