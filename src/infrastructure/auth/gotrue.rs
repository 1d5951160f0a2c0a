//! GoTrue (Supabase auth) session adapter

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::ports::{AuthError, AuthProvider, SessionStore};
use crate::domain::auth::Session;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl ErrorResponse {
    fn into_message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message)
    }
}

/// Session provider backed by the backend's auth endpoint.
/// The session is cached in memory and persisted through `S`.
pub struct GoTrueAuth<S>
where
    S: SessionStore,
{
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
    sessions: S,
    current: Mutex<Option<Session>>,
}

impl<S> GoTrueAuth<S>
where
    S: SessionStore,
{
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>, sessions: S) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            client: reqwest::Client::new(),
            sessions,
            current: Mutex::new(None),
        }
    }

    /// Store a session obtained elsewhere (e.g. pasted from the app)
    pub async fn sign_in_with(&self, session: Session) -> Result<(), AuthError> {
        self.sessions.save(&session).await?;
        info!(user_id = %session.user_id, "session stored");
        *self.current.lock().await = Some(session);
        Ok(())
    }

    fn token_url(&self) -> String {
        format!("{}/auth/v1/token?grant_type=refresh_token", self.base_url)
    }

    fn logout_url(&self) -> String {
        format!("{}/auth/v1/logout", self.base_url)
    }

    async fn loaded(&self, current: &mut Option<Session>) -> Result<Session, AuthError> {
        if let Some(session) = current.as_ref() {
            return Ok(session.clone());
        }
        let session = self.sessions.load().await?.ok_or(AuthError::NotSignedIn)?;
        *current = Some(session.clone());
        Ok(session)
    }

    /// Exchange `stale` for a fresh session while the caller holds the lock
    async fn rotate(
        &self,
        current: &mut Option<Session>,
        stale: Session,
    ) -> Result<Session, AuthError> {
        debug!(user_id = %stale.user_id, "refreshing session");
        let fresh = self.exchange(&stale.refresh_token).await?;
        self.sessions.save(&fresh).await?;

        *current = Some(fresh.clone());
        Ok(fresh)
    }

    async fn exchange(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.token_url())
            .header("apikey", &self.anon_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(ErrorResponse::into_message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(AuthError::RefreshFailed(message));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("unexpected response: {}", e)))?;

        Ok(Session {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_default(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: expiry(token.expires_at, token.expires_in, Utc::now()),
        })
    }
}

fn expiry(expires_at: Option<i64>, expires_in: Option<i64>, now: DateTime<Utc>) -> DateTime<Utc> {
    expires_at
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .or_else(|| expires_in.map(|secs| now + Duration::seconds(secs)))
        .unwrap_or(now)
}

#[async_trait]
impl<S> AuthProvider for GoTrueAuth<S>
where
    S: SessionStore,
{
    async fn session(&self) -> Result<Session, AuthError> {
        let mut current = self.current.lock().await;
        self.loaded(&mut current).await
    }

    async fn refresh(&self) -> Result<Session, AuthError> {
        let mut current = self.current.lock().await;
        let stale = self.loaded(&mut current).await?;
        self.rotate(&mut current, stale).await
    }

    // The expiry check and the exchange share one lock, so callers queued
    // behind a refresh see the rotated session instead of refreshing again.
    async fn valid_session(&self, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let mut current = self.current.lock().await;
        let session = self.loaded(&mut current).await?;
        if !session.is_expired(now) {
            return Ok(session);
        }
        self.rotate(&mut current, session).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut current = self.current.lock().await;
        if let Ok(session) = self.loaded(&mut current).await {
            let result = self
                .client
                .post(self.logout_url())
                .header("apikey", &self.anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
            if let Err(e) = result {
                warn!(error = %e, "remote sign-out failed, clearing local session anyway");
            }
        }

        self.sessions.clear().await?;
        *current = None;
        info!("signed out");
        Ok(())
    }
}
