//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `SubscriptionStore` / `SweepLock` - durable subscriber records
//! - `MembershipPlatform` - the messaging platform hosting the group
//! - `Clock` - current time

mod clock;
mod membership_platform;
mod subscription_store;

pub use clock::{Clock, SystemClock};
pub use membership_platform::{MembershipPlatform, PlatformError, ResolvedIdentity};
pub use subscription_store::{RecordPatch, RecordPredicate, SubscriptionStore, SweepLock};
