//! XDG config store adapter

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Directory name under the XDG config/data roots
pub const APP_DIR: &str = "smart-ledger";

/// XDG-compliant config store
pub struct XdgConfigStore {
    path: PathBuf,
}

impl XdgConfigStore {
    /// Create a new XDG config store with default path
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(APP_DIR);

        Self {
            path: config_dir.join("config.toml"),
        }
    }

    /// Create with custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse_toml(content: &str) -> Result<AppConfig, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn to_toml(config: &AppConfig) -> Result<String, ConfigError> {
        toml::to_string_pretty(config).map_err(|e| ConfigError::WriteError(e.to_string()))
    }
}

impl Default for XdgConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for XdgConfigStore {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.exists() {
            return Ok(AppConfig::empty());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::parse_toml(&content)
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let content = Self::to_toml(config)?;

        fs::write(&self.path, content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    async fn init(&self) -> Result<(), ConfigError> {
        if self.exists() {
            return Err(ConfigError::AlreadyExists(
                self.path.to_string_lossy().to_string(),
            ));
        }

        self.save(&AppConfig::defaults()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_is_xdg() {
        let path = XdgConfigStore::new().path();
        assert!(path.to_string_lossy().contains("smart-ledger"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn parse_toml_with_ai_section() {
        let content = r#"
store = "remote"
backend_url = "https://project.supabase.co"
sync_interval = "2m"

[ai]
language = "en"
"#;

        let config = XdgConfigStore::parse_toml(content).unwrap();
        assert_eq!(config.store.as_deref(), Some("remote"));
        assert_eq!(config.backend_url.as_deref(), Some("https://project.supabase.co"));
        assert_eq!(config.sync_interval.as_deref(), Some("2m"));
        assert_eq!(config.language_or_default(), "en");
        assert!(config.payment_api_key.is_none());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = XdgConfigStore::parse_toml("store = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));

        let config = store.load().await.unwrap();
        assert!(config.store.is_none());
    }

    #[tokio::test]
    async fn init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("nested").join("config.toml"));

        store.init().await.unwrap();
        let config = store.load().await.unwrap();
        assert_eq!(config.sync_interval.as_deref(), Some("5m"));

        let err = store.init().await.unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        let config = AppConfig {
            payment_api_key: Some("sk_test_123".to_string()),
            sync_timeout: Some("30s".to_string()),
            ..Default::default()
        };

        store.save(&config).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.payment_api_key.as_deref(), Some("sk_test_123"));
        assert_eq!(loaded.sync_timeout.as_deref(), Some("30s"));
    }
}
