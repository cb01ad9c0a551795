//! Typed outcome for secondary side effects.
//!
//! Notifications and invite revocations run after the primary effect has
//! been stored. Their failure is recorded and logged but never turned into
//! an error for the caller.

use std::future::Future;

use serde::Serialize;

use crate::ports::PlatformError;

/// Outcome of a best-effort platform call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum BestEffort {
    Delivered,
    Failed(String),
    /// No call was made (e.g. no recipient known).
    Skipped,
}

impl BestEffort {
    /// Await `call`, logging a warning tagged with `action` on failure.
    pub async fn attempt<F>(action: &'static str, call: F) -> Self
    where
        F: Future<Output = Result<(), PlatformError>>,
    {
        match call.await {
            Ok(()) => BestEffort::Delivered,
            Err(e) => {
                tracing::warn!(action, error = %e, "best-effort platform call failed");
                BestEffort::Failed(e.to_string())
            }
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, BestEffort::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_call_is_delivered() {
        let outcome = BestEffort::attempt("notify", async { Ok(()) }).await;
        assert_eq!(outcome, BestEffort::Delivered);
        assert!(outcome.is_delivered());
    }

    #[tokio::test]
    async fn failed_call_keeps_reason() {
        let outcome =
            BestEffort::attempt("notify", async { Err(PlatformError::Timeout) }).await;
        assert_eq!(
            outcome,
            BestEffort::Failed("platform request timed out".to_string())
        );
        assert!(!outcome.is_delivered());
    }

    #[test]
    fn serializes_with_outcome_tag() {
        let json = serde_json::to_value(BestEffort::Failed("boom".into())).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["reason"], "boom");

        let json = serde_json::to_value(BestEffort::Skipped).unwrap();
        assert_eq!(json["outcome"], "skipped");
    }
}
