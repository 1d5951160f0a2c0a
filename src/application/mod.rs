//! Application layer - Use cases and port interfaces
//!
//! Contains the core business operations and trait definitions
//! for external system interactions.

pub mod assistant;
pub mod ports;
pub mod reconciler;
pub mod sync_scheduler;
pub mod usage_limiter;
pub mod webhook;

// Re-export use cases
pub use assistant::{AssistError, TransactionAssistant, VoiceEntry};
pub use reconciler::{EntitlementSource, SubscriptionReconciler, SyncError, SyncOutcome};
pub use sync_scheduler::{SyncScheduler, SyncTrigger};
pub use usage_limiter::{UsageError, UsageLimiter};
pub use webhook::{WebhookError, WebhookOutcome, WebhookProcessor};
