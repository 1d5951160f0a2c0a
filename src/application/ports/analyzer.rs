//! Text analysis port interface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::transaction::TransactionAnalysis;

/// Text analysis errors
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API error: {0}")]
    ApiError(String),
}

/// One chat message sent to the text service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Port for the AI text service
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    /// Ask the service to structure a transaction.
    ///
    /// # Returns
    /// `Ok(None)` when the service answered but not with a usable transaction
    /// (malformed or incomplete JSON); `Err` when the call itself failed.
    async fn analyze(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Option<TransactionAnalysis>, AnalysisError>;
}

#[async_trait]
impl<T: TextAnalyzer + ?Sized> TextAnalyzer for std::sync::Arc<T> {
    async fn analyze(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Option<TransactionAnalysis>, AnalysisError> {
        self.as_ref().analyze(messages).await
    }
}
