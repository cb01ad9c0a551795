//! Subscription Gate - time-bounded paid membership for a messaging group.
//!
//! A subscriber buys access for a number of days and receives a single-use
//! invite link. Join requests are admitted only through a live, unused
//! invite; departures are recorded; lapsed members are swept out of the
//! group on a schedule.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
