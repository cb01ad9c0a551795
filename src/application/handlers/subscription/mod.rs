//! Subscription handlers.
//!
//! Command and query handlers for the subscription lifecycle:
//!
//! ## Commands
//! - Subscribe, extend and regenerate an invite after departure
//! - Arbitrate join requests and record departures (platform events)
//! - Sweep expired subscriptions and force-remove a subscriber (admin)
//!
//! ## Queries
//! - Validate a phone number
//! - List subscribers (admin)
//! - Subscriber history (admin)
//! - Resolve contacts in bulk (admin)

mod admit_join_request;
mod bulk_resolve;
mod extend;
mod force_remove;
mod list_subscribers;
mod record_departure;
mod regenerate_invite;
mod subscribe;
mod subscriber_history;
mod sweep_expired;
mod validate_phone;

#[cfg(test)]
mod test_support;

// Commands
pub use extend::{ExtendSubscriptionCommand, ExtendSubscriptionHandler, ExtendSubscriptionResult};
pub use force_remove::{ForceRemoveCommand, ForceRemoveHandler};
pub use regenerate_invite::{
    RegenerateInviteCommand, RegenerateInviteHandler, RegenerateInviteResult,
};
pub use subscribe::{
    SubscribeCommand, SubscribeHandler, SubscribeOutcome, SubscribeResult, MAX_DURATION_DAYS,
};
pub use sweep_expired::{SweepExpiredHandler, SweepOutcome, SweepReport};

// Platform events
pub use admit_join_request::{AdmissionArbiter, AdmissionDecision, DeclineReason};
pub use record_departure::{DepartureOutcome, RecordDepartureHandler};

// Queries
pub use bulk_resolve::{BulkResolveCommand, BulkResolveHandler, ResolveRow, ResolveStatus};
pub use list_subscribers::{ListSubscribersHandler, SubscriberListing};
pub use subscriber_history::{SubscriberHistoryHandler, SubscriberHistoryQuery};
pub use validate_phone::{PhoneValidation, ValidatePhoneCommand, ValidatePhoneHandler};
