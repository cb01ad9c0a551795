//! BulkResolveHandler - resolve many contacts to platform identities.
//!
//! Calls are made one at a time with a fixed pause between them, so a large
//! batch never bursts against the platform. A flood-wait that survives the
//! platform's own retries pauses the batch for the indicated time. Rows fail
//! individually; the batch always completes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::domain::foundation::PlatformUserId;
use crate::domain::subscription::PhoneNumber;
use crate::ports::{MembershipPlatform, PlatformError};

#[derive(Debug, Clone)]
pub struct BulkResolveCommand {
    pub phones: Vec<String>,
}

/// Resolution outcome for one input row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolveStatus {
    Resolved {
        user_id: PlatformUserId,
        display_name: Option<String>,
    },
    NotFound,
    Invalid { message: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveRow {
    /// The phone as submitted.
    pub phone: String,
    #[serde(flatten)]
    pub status: ResolveStatus,
}

pub struct BulkResolveHandler {
    platform: Arc<dyn MembershipPlatform>,
    delay: Duration,
}

impl BulkResolveHandler {
    pub fn new(platform: Arc<dyn MembershipPlatform>, delay: Duration) -> Self {
        Self { platform, delay }
    }

    /// Rows come back in input order, one per submitted phone.
    pub async fn handle(&self, cmd: BulkResolveCommand) -> Vec<ResolveRow> {
        let mut seen: HashMap<PhoneNumber, ResolveStatus> = HashMap::new();
        let mut rows = Vec::with_capacity(cmd.phones.len());
        let mut first_call = true;

        for raw in cmd.phones {
            let phone = match PhoneNumber::parse(&raw) {
                Ok(phone) => phone,
                Err(e) => {
                    rows.push(ResolveRow {
                        phone: raw,
                        status: ResolveStatus::Invalid {
                            message: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            if let Some(status) = seen.get(&phone) {
                rows.push(ResolveRow {
                    phone: raw,
                    status: status.clone(),
                });
                continue;
            }

            if !first_call {
                tokio::time::sleep(self.delay).await;
            }
            first_call = false;

            let status = self.resolve_one(&phone).await;
            seen.insert(phone, status.clone());
            rows.push(ResolveRow { phone: raw, status });
        }

        tracing::info!(rows = rows.len(), resolved = seen.len(), "bulk resolve finished");
        rows
    }

    async fn resolve_one(&self, phone: &PhoneNumber) -> ResolveStatus {
        match self.platform.resolve_identity(phone).await {
            Ok(Some(identity)) => ResolveStatus::Resolved {
                user_id: identity.user_id,
                display_name: identity.display_name,
            },
            Ok(None) => ResolveStatus::NotFound,
            Err(PlatformError::RateLimited { retry_after }) => {
                tracing::warn!(
                    phone = %phone,
                    retry_after_secs = retry_after.as_secs(),
                    "flood wait during bulk resolve, pausing batch"
                );
                tokio::time::sleep(retry_after).await;
                ResolveStatus::Failed {
                    reason: format!("rate limited for {}s", retry_after.as_secs()),
                }
            }
            Err(e) => {
                tracing::warn!(phone = %phone, error = %e, "bulk resolve entry failed");
                ResolveStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
