//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with external systems like Stripe, Groq, SQLite, etc.

pub mod ai;
pub mod auth;
pub mod config;
pub mod payment;
pub mod store;

// Re-export adapters
pub use ai::{GroqTextAnalyzer, GroqTranscriber};
pub use auth::{GoTrueAuth, StaticTokenAuth};
pub use config::{QuotaHintFile, SessionFile, XdgConfigStore};
pub use payment::{parse_event, StripeClient};
pub use store::{PostgrestStore, SqliteStore};
