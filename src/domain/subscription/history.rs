//! Append-only subscription history.
//!
//! One entry per lifecycle step. Entries are written after the record change
//! they describe and are kept after the record itself is removed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{PlatformUserId, SubscriberId, Timestamp};

use super::{PhoneNumber, SubscriberRecord};

/// Lifecycle step recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Subscribed,
    Restarted,
    InviteReissued,
    Admitted,
    Extended,
    Departed,
    Removed,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Subscribed => "subscribed",
            HistoryKind::Restarted => "restarted",
            HistoryKind::InviteReissued => "invite_reissued",
            HistoryKind::Admitted => "admitted",
            HistoryKind::Extended => "extended",
            HistoryKind::Departed => "departed",
            HistoryKind::Removed => "removed",
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribed" => Ok(HistoryKind::Subscribed),
            "restarted" => Ok(HistoryKind::Restarted),
            "invite_reissued" => Ok(HistoryKind::InviteReissued),
            "admitted" => Ok(HistoryKind::Admitted),
            "extended" => Ok(HistoryKind::Extended),
            "departed" => Ok(HistoryKind::Departed),
            "removed" => Ok(HistoryKind::Removed),
            other => Err(format!("unknown history kind: {}", other)),
        }
    }
}

/// Snapshot of a record at one lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub subscriber_id: SubscriberId,
    pub phone: PhoneNumber,
    pub platform_id: Option<PlatformUserId>,
    pub kind: HistoryKind,
    /// Expiry in force after this step.
    pub expiry_at: Timestamp,
    pub occurred_at: Timestamp,
}

impl HistoryEntry {
    pub fn of(kind: HistoryKind, record: &SubscriberRecord, occurred_at: Timestamp) -> Self {
        Self {
            subscriber_id: record.id,
            phone: record.phone.clone(),
            platform_id: record.platform_id,
            kind,
            expiry_at: record.expiry_at,
            occurred_at,
        }
    }
}
