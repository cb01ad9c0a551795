//! HTTP adapters - REST API and webhook.

pub mod subscription;
pub mod webhook;

pub use subscription::{app_router, GateAppState, GateSettings};
