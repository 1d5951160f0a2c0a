//! AI-assisted transaction entry use case

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::transaction::{AnalysisPrompt, TransactionDraft};
use crate::domain::usage::UsageKind;
use crate::domain::voice::AudioClip;

use super::ports::{
    AnalysisError, ChatMessage, TextAnalyzer, Transcriber, TranscriptionError, UsageStore,
};
use super::usage_limiter::{UsageError, UsageLimiter};

/// Errors from the assistant
#[derive(Debug, Clone, Error)]
pub enum AssistError {
    #[error("Please describe the transaction")]
    EmptyInput,

    #[error("{0}")]
    Usage(#[from] UsageError),

    #[error("Text analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),
}

impl AssistError {
    /// Quota denials are an expected outcome, not a failure
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::Usage(UsageError::QuotaExceeded { .. }))
    }
}

/// Result of a voice entry
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceEntry {
    pub transcript: String,
    /// None when the transcript did not describe a usable transaction
    pub draft: Option<TransactionDraft>,
}

/// Turns free text or speech into transaction drafts, metered per user
pub struct TransactionAssistant<U, T, R>
where
    U: UsageStore,
    T: TextAnalyzer,
    R: Transcriber,
{
    limiter: Arc<UsageLimiter<U>>,
    analyzer: T,
    transcriber: R,
}

impl<U, T, R> TransactionAssistant<U, T, R>
where
    U: UsageStore,
    T: TextAnalyzer,
    R: Transcriber,
{
    pub fn new(limiter: Arc<UsageLimiter<U>>, analyzer: T, transcriber: R) -> Self {
        Self {
            limiter,
            analyzer,
            transcriber,
        }
    }

    pub fn limiter(&self) -> &UsageLimiter<U> {
        &self.limiter
    }

    /// Structure a free-text description into a draft.
    ///
    /// Consumes one natural-input unit before the service is called. An
    /// answer that does not describe a usable transaction yields `Ok(None)`.
    #[instrument(skip(self, text))]
    pub async fn parse_natural_input(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<Option<TransactionDraft>, AssistError> {
        if text.trim().is_empty() {
            return Err(AssistError::EmptyInput);
        }

        self.limiter
            .try_consume(user_id, UsageKind::NaturalInput)
            .await?;

        let draft = self.analyze(text).await?;
        if draft.is_none() {
            info!("analysis returned no usable transaction");
        }
        Ok(draft)
    }

    /// Transcribe a voice clip and structure the transcript.
    ///
    /// Consumes one transcription unit. Analysis of the transcript belongs
    /// to the same action and is not metered separately; its failure only
    /// drops the draft. An empty transcript ends the flow with an error.
    #[instrument(skip(self, audio), fields(size = %audio.human_readable_size()))]
    pub async fn transcribe_and_analyze(
        &self,
        user_id: &str,
        audio: &AudioClip,
    ) -> Result<VoiceEntry, AssistError> {
        self.limiter
            .try_consume(user_id, UsageKind::Transcription)
            .await?;

        let transcript = self.transcriber.transcribe(audio).await?;
        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(TranscriptionError::EmptyResponse.into());
        }
        debug!(chars = transcript.len(), "transcript received");

        let draft = match self.analyze(&transcript).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!(error = %e, "automatic analysis failed");
                None
            }
        };

        Ok(VoiceEntry { transcript, draft })
    }

    async fn analyze(&self, text: &str) -> Result<Option<TransactionDraft>, AnalysisError> {
        let prompt = AnalysisPrompt::build(text);
        let messages = [ChatMessage::user(prompt.into_content())];
        let today = self.limiter.today();

        Ok(self
            .analyzer
            .analyze(&messages)
            .await?
            .filter(|analysis| analysis.is_usable())
            .map(|analysis| analysis.into_draft(today)))
    }
}
