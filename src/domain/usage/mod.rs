//! Daily AI usage domain module

mod counter;
mod hint;
mod kind;
mod snapshot;

pub use counter::{UsageCounter, FREE_DAILY_LIMIT};
pub use hint::QuotaHints;
pub use kind::{UsageKind, ALL_USAGE_KINDS};
pub use snapshot::{Quota, UsageSnapshot};
