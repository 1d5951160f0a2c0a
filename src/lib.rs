//! SmartLedger - personal finance backend core
//!
//! This crate provides the subscription and quota plumbing behind the
//! SmartLedger app: daily free-tier limits for the AI features, a local
//! mirror of the user's payment-provider subscription, and the AI assistant
//! that turns free text or voice notes into transaction drafts.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Core business logic, value objects, entities, and errors
//! - **Application**: Use cases and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (SQLite, PostgREST, GoTrue, Stripe, Groq)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
