//! Subscription module - time-bounded group membership.
//!
//! A subscriber pays for N days, receives a single-use invite, is admitted
//! when they use it and removed when the subscription lapses.

mod errors;
mod events;
mod history;
mod invite;
mod phone;
mod record;
mod state;

pub use errors::SubscriptionError;
pub use events::{JoinRequestReceived, MemberLeftOrRemoved};
pub use history::{HistoryEntry, HistoryKind};
pub use invite::InviteToken;
pub use phone::PhoneNumber;
pub use record::{SubscribeAction, SubscriberRecord};
pub use state::SubscriptionState;
