//! In-process adapters: subscription store, sweep lock and a manual clock.

mod clock;
mod subscription_store;

pub use clock::ManualClock;
pub use subscription_store::{InMemorySubscriptionStore, InMemorySweepLock};
