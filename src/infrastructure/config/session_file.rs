//! Session file adapter

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::{AuthError, SessionStore};
use crate::domain::auth::Session;

use super::xdg::APP_DIR;

/// Signed-in session kept as JSON under the XDG data directory
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join(APP_DIR);

        Self {
            path: data_dir.join("session.json"),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Default for SessionFile {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for SessionFile {
    async fn load(&self) -> Result<Option<Session>, AuthError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| AuthError::Storage(format!("corrupt session file: {}", e)))
    }

    async fn save(&self, session: &Session) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Storage(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(session)
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        fs::write(&self.path, content)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| AuthError::Storage(e.to_string()))?;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }
}
