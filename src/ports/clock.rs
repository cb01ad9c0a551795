//! Clock port.
//!
//! Handlers read the current time through this trait so lifecycle rules can
//! be tested at fixed instants (e.g. a sweep "eight days later").

use crate::domain::foundation::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
