//! Background jobs driven by the tokio timer.

mod expiry_sweeper;

pub use expiry_sweeper::ExpirySweeperService;
