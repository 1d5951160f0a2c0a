//! Session persistence port interface

use async_trait::async_trait;

use super::auth::AuthError;
use crate::domain::auth::Session;

/// Port for keeping the signed-in session between runs
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stored session, or None when signed out.
    async fn load(&self) -> Result<Option<Session>, AuthError>;

    async fn save(&self, session: &Session) -> Result<(), AuthError>;

    /// Forget the session (sign-out).
    async fn clear(&self) -> Result<(), AuthError>;
}
