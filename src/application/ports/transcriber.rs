//! Transcription port interface

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::voice::AudioClip;

/// Transcription errors
#[derive(Debug, Clone, Error)]
pub enum TranscriptionError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Empty transcription")]
    EmptyResponse,

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("API error: {0}")]
    ApiError(String),
}

/// Port for speech-to-text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a voice clip to text.
    ///
    /// # Returns
    /// The trimmed transcript; an empty transcript is `EmptyResponse`.
    async fn transcribe(&self, audio: &AudioClip) -> Result<String, TranscriptionError>;
}

#[async_trait]
impl<T: Transcriber + ?Sized> Transcriber for std::sync::Arc<T> {
    async fn transcribe(&self, audio: &AudioClip) -> Result<String, TranscriptionError> {
        self.as_ref().transcribe(audio).await
    }
}
