//! Domain error types

use thiserror::Error;

/// Error when parsing an interval string
#[derive(Debug, Clone, Error)]
#[error("Invalid interval format: \"{input}\". Expected format: <number>s, <number>m, or <number>m<number>s (e.g., 10s, 5m, 1m30s)")]
pub struct IntervalParseError {
    pub input: String,
}

/// Error when an unknown usage kind is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid usage kind: \"{input}\". Valid kinds are: transcription, natural_input")]
pub struct InvalidUsageKindError {
    pub input: String,
}

/// Error when an unknown entitlement status is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid entitlement status: \"{input}\". Valid statuses are: active, inactive, canceled, past_due, trialing")]
pub struct InvalidStatusError {
    pub input: String,
}

/// Error when an unknown transaction type is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid transaction type: \"{input}\". Expected income or expense")]
pub struct InvalidTransactionTypeError {
    pub input: String,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),

    #[error("Missing required setting '{key}'. Set it with 'smart-ledger config set {key} <value>' or {env}")]
    Missing { key: String, env: String },
}
