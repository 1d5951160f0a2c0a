//! Domain layer - Core business logic
//!
//! Contains value objects, entities, and domain errors.
//! This layer has no dependencies on external systems.

pub mod auth;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod schedule;
pub mod transaction;
pub mod usage;
pub mod voice;

// Re-export common types
pub use auth::Session;
pub use config::AppConfig;
pub use entitlement::{Entitlement, EntitlementPatch, EntitlementStatus};
pub use error::*;
pub use schedule::Interval;
pub use transaction::{AnalysisPrompt, TransactionAnalysis, TransactionDraft, TransactionType};
pub use usage::{Quota, UsageCounter, UsageKind, UsageSnapshot, FREE_DAILY_LIMIT};
pub use voice::{AudioClip, AudioFormat};
