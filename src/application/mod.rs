//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Secondary effects (notifications, invite revocation) are reported as
//! `BestEffort` outcomes rather than errors, and history appends are logged
//! rather than raised.

pub mod handlers;

mod best_effort;
mod history;
mod invite_issuer;
mod notifier;

pub use best_effort::BestEffort;
pub use history::record_history;
pub use invite_issuer::InviteIssuer;
pub use notifier::SubscriberNotifier;
