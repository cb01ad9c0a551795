//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (timestamps, IDs, errors, state machine)
//! - `subscription` - Subscriber records, invites and the lifecycle state machine

pub mod foundation;
pub mod subscription;
