//! Application configuration value object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::schedule::Interval;

/// Default chat model for transaction analysis
pub const DEFAULT_TEXT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Default speech-to-text model
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3";

/// Default spoken language hint
pub const DEFAULT_LANGUAGE: &str = "it";

/// Where counters and entitlements live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Local SQLite database
    #[default]
    Sqlite,
    /// Hosted Postgres behind the backend's REST gateway
    Remote,
}

impl StoreBackend {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Remote => "remote",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "remote" => Ok(Self::Remote),
            _ => Err(ConfigError::ValidationError {
                key: "store".to_string(),
                message: format!("\"{}\" is not one of: sqlite, remote", s),
            }),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// AI service settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiConfig {
    pub text_model: Option<String>,
    pub transcription_model: Option<String>,
    pub language: Option<String>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: Option<String>,
    pub database_path: Option<String>,
    pub backend_url: Option<String>,
    pub backend_anon_key: Option<String>,
    /// Service credential used for entitlement writes on the remote store
    pub service_key: Option<String>,
    pub payment_api_key: Option<String>,
    pub payment_api_base: Option<String>,
    pub ai_api_key: Option<String>,
    pub sync_interval: Option<String>,
    pub sync_timeout: Option<String>,
    pub ai: Option<AiConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            store: Some(StoreBackend::default().to_string()),
            sync_interval: Some(Interval::default_sync_interval().to_string()),
            sync_timeout: Some(Interval::default_sync_timeout().to_string()),
            ai: Some(AiConfig {
                text_model: Some(DEFAULT_TEXT_MODEL.to_string()),
                transcription_model: Some(DEFAULT_TRANSCRIPTION_MODEL.to_string()),
                language: Some(DEFAULT_LANGUAGE.to_string()),
            }),
            ..Self::empty()
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            store: other.store.or(self.store),
            database_path: other.database_path.or(self.database_path),
            backend_url: other.backend_url.or(self.backend_url),
            backend_anon_key: other.backend_anon_key.or(self.backend_anon_key),
            service_key: other.service_key.or(self.service_key),
            payment_api_key: other.payment_api_key.or(self.payment_api_key),
            payment_api_base: other.payment_api_base.or(self.payment_api_base),
            ai_api_key: other.ai_api_key.or(self.ai_api_key),
            sync_interval: other.sync_interval.or(self.sync_interval),
            sync_timeout: other.sync_timeout.or(self.sync_timeout),
            ai: Self::merge_ai_config(self.ai, other.ai),
        }
    }

    fn merge_ai_config(base: Option<AiConfig>, other: Option<AiConfig>) -> Option<AiConfig> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(AiConfig {
                text_model: o.text_model.or(b.text_model),
                transcription_model: o.transcription_model.or(b.transcription_model),
                language: o.language.or(b.language),
            }),
        }
    }

    /// Get store backend, or sqlite if not set/invalid
    pub fn store_or_default(&self) -> StoreBackend {
        self.store
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Get sync interval, or 5m if not set/invalid
    pub fn sync_interval_or_default(&self) -> Interval {
        self.sync_interval
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Interval::default_sync_interval)
    }

    /// Get sync timeout, or 10s if not set/invalid
    pub fn sync_timeout_or_default(&self) -> Interval {
        self.sync_timeout
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Interval::default_sync_timeout)
    }

    pub fn text_model_or_default(&self) -> &str {
        self.ai
            .as_ref()
            .and_then(|ai| ai.text_model.as_deref())
            .unwrap_or(DEFAULT_TEXT_MODEL)
    }

    pub fn transcription_model_or_default(&self) -> &str {
        self.ai
            .as_ref()
            .and_then(|ai| ai.transcription_model.as_deref())
            .unwrap_or(DEFAULT_TRANSCRIPTION_MODEL)
    }

    pub fn language_or_default(&self) -> &str {
        self.ai
            .as_ref()
            .and_then(|ai| ai.language.as_deref())
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Return a required string setting or a `Missing` error naming its env var
    pub fn require<'a>(
        value: &'a Option<String>,
        key: &str,
        env: &str,
    ) -> Result<&'a str, ConfigError> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                key: key.to_string(),
                env: format!("set {}", env),
            })
    }
}
