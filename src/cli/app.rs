//! Application wiring: logging, merged configuration and adapters

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::application::ports::{
    AuthError, AuthProvider, ConfigStore, EntitlementStore, PaymentError, QuotaHintStore,
    StoreError, UsageStore,
};
use crate::application::{
    AssistError, SubscriptionReconciler, SyncError, TransactionAssistant, UsageError,
    UsageLimiter, WebhookError,
};
use crate::domain::config::{AppConfig, StoreBackend};
use crate::domain::entitlement::{Entitlement, EntitlementPatch};
use crate::domain::error::ConfigError;
use crate::domain::usage::{UsageKind, UsageSnapshot};
use crate::domain::voice::InvalidAudioError;
use crate::infrastructure::config::APP_DIR;
use crate::infrastructure::{
    GoTrueAuth, GroqTextAnalyzer, GroqTranscriber, PostgrestStore, QuotaHintFile, SessionFile,
    SqliteStore, StaticTokenAuth, StripeClient, XdgConfigStore,
};

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;
/// `usage check` on an exhausted kind
pub const EXIT_UNAVAILABLE: u8 = 3;

/// SQLite file name under the data directory
const DATABASE_FILE: &str = "ledger.db";

/// Quota hint file name, kept beside the database
const QUOTA_HINT_FILE: &str = "quota_hints.json";

/// Errors surfaced by CLI commands
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Payment(#[from] PaymentError),

    #[error("{0}")]
    Usage(#[from] UsageError),

    #[error("{0}")]
    Sync(#[from] SyncError),

    #[error("{0}")]
    Webhook(#[from] WebhookError),

    #[error("{0}")]
    Assist(#[from] AssistError),

    #[error("{0}")]
    Audio(#[from] InvalidAudioError),

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to set up signal handler: {0}")]
    Signal(String),
}

/// Install the stderr log subscriber.
/// `RUST_LOG` wins; otherwise `-v` raises the level from `warn`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.is_empty())
}

/// Settings taken from the environment
pub fn env_config() -> AppConfig {
    AppConfig {
        backend_url: env_value("SMART_LEDGER_BACKEND_URL"),
        backend_anon_key: env_value("SMART_LEDGER_ANON_KEY"),
        service_key: env_value("SMART_LEDGER_SERVICE_KEY"),
        payment_api_key: env_value("STRIPE_SECRET_KEY"),
        ai_api_key: env_value("GROQ_API_KEY"),
        database_path: env_value("SMART_LEDGER_DATABASE"),
        ..Default::default()
    }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load_or_empty().await;

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}

/// Default SQLite location under the user data directory
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(DATABASE_FILE)
}

/// The data store chosen by configuration
#[derive(Clone)]
pub enum LedgerStore {
    Local(SqliteStore),
    Remote(Arc<PostgrestStore<Arc<dyn AuthProvider>>>),
}

#[async_trait]
impl UsageStore for LedgerStore {
    async fn usage(&self, user_id: &str, today: NaiveDate) -> Result<UsageSnapshot, StoreError> {
        match self {
            Self::Local(store) => store.usage(user_id, today).await,
            Self::Remote(store) => store.usage(user_id, today).await,
        }
    }

    async fn increment_and_check(
        &self,
        user_id: &str,
        kind: UsageKind,
        today: NaiveDate,
    ) -> Result<bool, StoreError> {
        match self {
            Self::Local(store) => store.increment_and_check(user_id, kind, today).await,
            Self::Remote(store) => store.increment_and_check(user_id, kind, today).await,
        }
    }
}

#[async_trait]
impl EntitlementStore for LedgerStore {
    async fn entitlement(&self, user_id: &str) -> Result<Option<Entitlement>, StoreError> {
        match self {
            Self::Local(store) => store.entitlement(user_id).await,
            Self::Remote(store) => store.entitlement(user_id).await,
        }
    }

    async fn upsert(&self, entitlement: &Entitlement) -> Result<(), StoreError> {
        match self {
            Self::Local(store) => store.upsert(entitlement).await,
            Self::Remote(store) => store.upsert(entitlement).await,
        }
    }

    async fn update_by_subscription(
        &self,
        subscription_id: &str,
        patch: &EntitlementPatch,
    ) -> Result<bool, StoreError> {
        match self {
            Self::Local(store) => store.update_by_subscription(subscription_id, patch).await,
            Self::Remote(store) => store.update_by_subscription(subscription_id, patch).await,
        }
    }
}

pub type UserAuth = Arc<GoTrueAuth<SessionFile>>;
pub type Reconciler = SubscriptionReconciler<UserAuth, Arc<StripeClient>, LedgerStore>;
pub type Limiter = UsageLimiter<LedgerStore>;
pub type Assistant = TransactionAssistant<LedgerStore, GroqTextAnalyzer, GroqTranscriber>;

/// Adapters built from the merged configuration
pub struct AppContext {
    config: AppConfig,
    auth: UserAuth,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        let auth = GoTrueAuth::new(
            config.backend_url.clone().unwrap_or_default(),
            config.backend_anon_key.clone().unwrap_or_default(),
            SessionFile::new(),
        );
        Self {
            config,
            auth: Arc::new(auth),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The signed-in user's session provider
    pub fn auth(&self) -> &UserAuth {
        &self.auth
    }

    fn database_path(&self) -> PathBuf {
        self.config
            .database_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path)
    }

    /// Local file holding quota denial hints
    pub fn quota_hints(&self) -> QuotaHintFile {
        QuotaHintFile::new(self.database_path().with_file_name(QUOTA_HINT_FILE))
    }

    /// Usage gate whose denial hints persist between runs
    pub fn limiter(&self) -> Result<Limiter, CommandError> {
        let hints: Arc<dyn QuotaHintStore> = Arc::new(self.quota_hints());
        Ok(UsageLimiter::new(self.store()?).with_hint_store(hints))
    }

    fn remote_store(&self, auth: Arc<dyn AuthProvider>, key: &str) -> Result<LedgerStore, ConfigError> {
        let url = AppConfig::require(
            &self.config.backend_url,
            "backend_url",
            "SMART_LEDGER_BACKEND_URL",
        )?;
        Ok(LedgerStore::Remote(Arc::new(PostgrestStore::new(url, key, auth))))
    }

    /// Store acting as the signed-in user
    pub fn store(&self) -> Result<LedgerStore, CommandError> {
        match self.config.store_or_default() {
            StoreBackend::Sqlite => Ok(LedgerStore::Local(SqliteStore::open(self.database_path())?)),
            StoreBackend::Remote => {
                let anon_key = AppConfig::require(
                    &self.config.backend_anon_key,
                    "backend_anon_key",
                    "SMART_LEDGER_ANON_KEY",
                )?;
                let auth: Arc<dyn AuthProvider> = self.auth.clone();
                Ok(self.remote_store(auth, anon_key)?)
            }
        }
    }

    /// Store acting with the service credential. Entitlements are only
    /// written through this one; users can read theirs but not change it.
    pub fn service_store(&self) -> Result<LedgerStore, CommandError> {
        match self.config.store_or_default() {
            StoreBackend::Sqlite => Ok(LedgerStore::Local(SqliteStore::open(self.database_path())?)),
            StoreBackend::Remote => {
                let key = AppConfig::require(
                    &self.config.service_key,
                    "service_key",
                    "SMART_LEDGER_SERVICE_KEY",
                )?;
                let auth: Arc<dyn AuthProvider> = Arc::new(StaticTokenAuth::new(key));
                Ok(self.remote_store(auth, key)?)
            }
        }
    }

    pub fn payments(&self) -> Result<Arc<StripeClient>, ConfigError> {
        let key = AppConfig::require(
            &self.config.payment_api_key,
            "payment_api_key",
            "STRIPE_SECRET_KEY",
        )?;
        let client = match self.config.payment_api_base.as_deref() {
            Some(base) if !base.is_empty() => StripeClient::with_base_url(key, base),
            _ => StripeClient::new(key),
        };
        Ok(Arc::new(client))
    }

    pub fn reconciler(&self) -> Result<Reconciler, CommandError> {
        Ok(
            SubscriptionReconciler::new(
                Arc::clone(&self.auth),
                self.payments()?,
                self.service_store()?,
            )
            .with_timeout(self.config.sync_timeout_or_default()),
        )
    }

    pub fn assistant(&self) -> Result<Assistant, CommandError> {
        let key = AppConfig::require(&self.config.ai_api_key, "ai_api_key", "GROQ_API_KEY")?;
        let analyzer = GroqTextAnalyzer::with_model(key, self.config.text_model_or_default());
        let transcriber = GroqTranscriber::with_model(
            key,
            self.config.transcription_model_or_default(),
            self.config.language_or_default(),
        );
        Ok(TransactionAssistant::new(
            Arc::new(self.limiter()?),
            analyzer,
            transcriber,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AppConfig {
        AppConfig {
            database_path: Some(dir.path().join("ledger.db").to_string_lossy().into_owned()),
            ..AppConfig::defaults()
        }
    }

    #[test]
    fn default_database_lives_under_app_dir() {
        let path = default_database_path();
        assert!(path.ends_with(format!("{}/{}", APP_DIR, DATABASE_FILE)));
    }

    #[test]
    fn sqlite_store_opens_configured_path() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::new(config(&dir));

        assert!(matches!(ctx.store().unwrap(), LedgerStore::Local(_)));
        assert!(dir.path().join("ledger.db").exists());
    }

    #[test]
    fn remote_store_requires_backend_settings() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::new(AppConfig {
            store: Some("remote".to_string()),
            ..config(&dir)
        });

        match ctx.store() {
            Err(CommandError::Config(ConfigError::Missing { key, .. })) => {
                assert_eq!(key, "backend_anon_key")
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    fn remote(dir: &TempDir, service_key: Option<&str>) -> AppContext {
        AppContext::new(AppConfig {
            store: Some("remote".to_string()),
            backend_url: Some("https://example.supabase.co".to_string()),
            backend_anon_key: Some("anon-key".to_string()),
            payment_api_key: Some("sk_test_123".to_string()),
            service_key: service_key.map(String::from),
            ..config(dir)
        })
    }

    #[test]
    fn service_store_requires_service_key_for_remote() {
        let dir = TempDir::new().unwrap();

        match remote(&dir, None).service_store() {
            Err(CommandError::Config(ConfigError::Missing { key, .. })) => {
                assert_eq!(key, "service_key")
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            remote(&dir, Some("service-role-key")).service_store().unwrap(),
            LedgerStore::Remote(_)
        ));
    }

    #[test]
    fn remote_reconciler_writes_with_service_credential() {
        let dir = TempDir::new().unwrap();

        // The user's own token can no longer write entitlements.
        match remote(&dir, None).reconciler() {
            Err(CommandError::Config(ConfigError::Missing { key, .. })) => {
                assert_eq!(key, "service_key")
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("reconciler built without a service credential"),
        }
        assert!(remote(&dir, Some("service-role-key")).reconciler().is_ok());
    }

    #[test]
    fn sqlite_reconciler_needs_no_service_key() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::new(AppConfig {
            payment_api_key: Some("sk_test_123".to_string()),
            ..config(&dir)
        });

        assert!(ctx.reconciler().is_ok());
    }

    #[test]
    fn missing_api_keys_name_their_env_vars() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::new(config(&dir));

        match ctx.payments() {
            Err(e) => assert!(e.to_string().contains("STRIPE_SECRET_KEY")),
            Ok(_) => panic!("payment client built without an API key"),
        }

        match ctx.assistant() {
            Err(e) => assert!(e.to_string().contains("GROQ_API_KEY")),
            Ok(_) => panic!("assistant built without an API key"),
        }
    }

    #[tokio::test]
    async fn ledger_store_delegates_to_sqlite() {
        let store = LedgerStore::Local(SqliteStore::open_in_memory().unwrap());
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        assert!(store
            .increment_and_check("u-1", UsageKind::NaturalInput, today)
            .await
            .unwrap());
        let snapshot = store.usage("u-1", today).await.unwrap();
        assert_eq!(snapshot.used(UsageKind::NaturalInput), 1);
        assert!(store.entitlement("u-1").await.unwrap().is_none());
    }
}
