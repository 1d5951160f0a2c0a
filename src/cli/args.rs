//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::domain::config::StoreBackend;
use crate::domain::usage::UsageKind;

/// SmartLedger - AI-assisted personal finance ledger
#[derive(Parser, Debug)]
#[command(name = "smart-ledger")]
#[command(version)]
#[command(about = "Daily AI quotas and subscription sync for the SmartLedger finance app")]
#[command(long_about = None)]
pub struct Cli {
    /// Data store backend (overrides config)
    #[arg(long, global = true, value_name = "BACKEND")]
    pub store: Option<StoreArg>,

    /// SQLite database file (overrides config)
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Service credential for entitlement writes on the remote store (overrides config)
    #[arg(long, global = true, value_name = "KEY")]
    pub service_key: Option<String>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG wins when set.
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the signed-in session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Show today's AI usage
    Usage {
        #[command(subcommand)]
        action: Option<UsageAction>,
    },
    /// Turn a free-text description into a transaction draft
    Parse {
        /// Text such as "Cena fuori 45 euro"
        text: String,
    },
    /// Transcribe a voice note and turn it into a transaction draft
    Transcribe {
        /// Audio file (webm, wav, mp3, ogg, flac, m4a)
        file: PathBuf,
    },
    /// Sync the subscription from the payment provider now
    Sync,
    /// Keep the subscription in sync until interrupted
    Watch {
        /// Sync interval (e.g., 30s, 5m, 1m30s)
        #[arg(short = 'i', long, value_name = "TIME")]
        interval: Option<String>,
    },
    /// Apply a payment provider webhook event from a JSON file
    Webhook {
        /// Event payload as delivered by the provider
        file: PathBuf,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Session actions
#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Store a session issued by the backend
    Set {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "SMART_LEDGER_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,

        #[arg(long, env = "SMART_LEDGER_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,

        /// Seconds until the access token expires
        #[arg(long, default_value_t = 3600)]
        expires_in: i64,
    },
    /// Show the stored session
    Show,
    /// Sign out and forget the session
    Clear,
}

/// Usage actions
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum UsageAction {
    /// Exit non-zero unless `kind` can be used right now
    Check {
        #[arg(value_enum)]
        kind: KindArg,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Store argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreArg {
    Sqlite,
    Remote,
}

impl From<StoreArg> for StoreBackend {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Sqlite => StoreBackend::Sqlite,
            StoreArg::Remote => StoreBackend::Remote,
        }
    }
}

/// Usage kind argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Transcription,
    #[value(name = "natural_input", alias = "natural-input")]
    NaturalInput,
}

impl From<KindArg> for UsageKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Transcription => UsageKind::Transcription,
            KindArg::NaturalInput => UsageKind::NaturalInput,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "store",
    "database_path",
    "backend_url",
    "backend_anon_key",
    "service_key",
    "payment_api_key",
    "payment_api_base",
    "ai_api_key",
    "sync_interval",
    "sync_timeout",
    "ai.text_model",
    "ai.transcription_model",
    "ai.language",
];

/// Keys whose values are masked on display
pub const SECRET_CONFIG_KEYS: &[&str] = &[
    "backend_anon_key",
    "service_key",
    "payment_api_key",
    "ai_api_key",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
