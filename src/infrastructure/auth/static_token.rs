//! Fixed-credential auth adapter for server-side tools

use async_trait::async_trait;
use chrono::DateTime;

use crate::application::ports::{AuthError, AuthProvider};
use crate::domain::auth::Session;

/// Serves one never-expiring credential, such as a service-role key.
/// Nothing to refresh; `refresh` hands back the same session.
pub struct StaticTokenAuth {
    session: Session,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            session: Session {
                user_id: "service".to_string(),
                email: String::new(),
                access_token: token.into(),
                refresh_token: String::new(),
                expires_at: DateTime::<chrono::Utc>::MAX_UTC,
            },
        }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn session(&self) -> Result<Session, AuthError> {
        Ok(self.session.clone())
    }

    async fn refresh(&self) -> Result<Session, AuthError> {
        Ok(self.session.clone())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
