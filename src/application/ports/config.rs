//! Configuration port interface

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Port for configuration storage
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the stored configuration.
    /// A missing file yields an empty config, not an error.
    async fn load(&self) -> Result<AppConfig, ConfigError>;

    /// Persist `config`, creating parent directories as needed.
    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    fn path(&self) -> PathBuf;

    fn exists(&self) -> bool;

    /// Write the defaults. Fails if the file already exists.
    async fn init(&self) -> Result<(), ConfigError>;

    /// Stored configuration, treating unreadable files as empty
    async fn load_or_empty(&self) -> AppConfig {
        match self.load().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %self.path().display(), error = %e, "ignoring unreadable config");
                AppConfig::empty()
            }
        }
    }
}
