//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod analyzer;
pub mod auth;
pub mod clock;
pub mod config;
pub mod payment;
pub mod quota_hint;
pub mod session;
pub mod store;
pub mod transcriber;

// Re-export common types
pub use analyzer::{AnalysisError, ChatMessage, TextAnalyzer};
pub use auth::{AuthError, AuthProvider};
pub use clock::{Clock, SystemClock};
pub use config::ConfigStore;
pub use payment::{
    CheckoutMode, CheckoutSession, Customer, PaymentError, PaymentEvent, PaymentProvider,
    ProviderPayment, ProviderSubscription, USER_ID_METADATA_KEY,
};
pub use quota_hint::QuotaHintStore;
pub use session::SessionStore;
pub use store::{EntitlementStore, StoreError, UsageStore};
pub use transcriber::{Transcriber, TranscriptionError};
