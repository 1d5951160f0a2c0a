//! Quota hint file adapter

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::{QuotaHintStore, StoreError};
use crate::domain::usage::QuotaHints;

/// Quota denial hints kept as a JSON file beside the local database
pub struct QuotaHintFile {
    path: PathBuf,
}

impl QuotaHintFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QuotaHintStore for QuotaHintFile {
    async fn load(&self) -> Result<QuotaHints, StoreError> {
        if !self.path.exists() {
            return Ok(QuotaHints::default());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        serde_json::from_str(&content)
            .map_err(|e| StoreError::ParseError(format!("corrupt quota hint file: {}", e)))
    }

    async fn save(&self, hints: &QuotaHints) -> Result<(), StoreError> {
        if hints.is_empty() {
            return match fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::Database(e.to_string())),
            };
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(hints)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        fs::write(&self.path, content)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}
