//! Scheduling value objects

mod interval;

pub use interval::{Interval, DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_SYNC_TIMEOUT_SECS};
