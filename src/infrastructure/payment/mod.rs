//! Payment provider adapters

mod events;
mod stripe;

pub use events::parse_event;
pub use stripe::StripeClient;
