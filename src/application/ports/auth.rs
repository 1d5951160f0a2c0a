//! Identity/token port interface

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::auth::Session;

/// Authentication errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Not signed in. Please sign in again.")]
    NotSignedIn,

    #[error("Session refresh failed: {0}. Please sign in again.")]
    RefreshFailed(String),

    #[error("Failed to persist session: {0}")]
    Storage(String),
}

/// Port for the identity provider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session, possibly with an expired access token.
    async fn session(&self) -> Result<Session, AuthError>;

    /// Exchange the refresh token for a new session.
    async fn refresh(&self) -> Result<Session, AuthError>;

    /// Drop the session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Session whose access token is valid at `now`, refreshing once if needed.
    async fn valid_session(&self, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let session = self.session().await?;
        if session.is_expired(now) {
            tracing::debug!(user_id = %session.user_id, "access token expired, refreshing");
            return self.refresh().await;
        }
        Ok(session)
    }
}

#[async_trait]
impl<T: AuthProvider + ?Sized> AuthProvider for Arc<T> {
    async fn session(&self) -> Result<Session, AuthError> {
        self.as_ref().session().await
    }

    async fn refresh(&self) -> Result<Session, AuthError> {
        self.as_ref().refresh().await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.as_ref().sign_out().await
    }
}
