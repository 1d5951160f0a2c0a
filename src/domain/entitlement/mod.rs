//! Entitlement domain module

mod record;
mod status;

pub use record::{lifetime_period_end, Entitlement, EntitlementPatch};
pub use status::EntitlementStatus;
