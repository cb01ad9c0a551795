//! Adapters - Implementations of port interfaces.
//!
//! - `postgres` - sqlx subscription store and advisory sweep lock
//! - `memory` - in-process store, sweep lock and manual clock
//! - `telegram` - Bot API client, contact resolver and flood-wait retry
//! - `http` - axum routes for subscribers, operators and the webhook
//! - `scheduler` - background expiry sweeper

pub mod http;
pub mod memory;
pub mod postgres;
pub mod scheduler;
pub mod telegram;
