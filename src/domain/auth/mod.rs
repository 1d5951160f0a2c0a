//! Authenticated session domain module

mod session;

pub use session::{Session, EXPIRY_LEEWAY_SECS};
