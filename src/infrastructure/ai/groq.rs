//! Groq API adapters (OpenAI-compatible chat and speech-to-text)

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::ports::{
    AnalysisError, ChatMessage, TextAnalyzer, Transcriber, TranscriptionError,
};
use crate::domain::config::{DEFAULT_LANGUAGE, DEFAULT_TEXT_MODEL, DEFAULT_TRANSCRIPTION_MODEL};
use crate::domain::transaction::TransactionAnalysis;
use crate::domain::voice::AudioClip;

/// Groq OpenAI-compatible API base URL
const API_BASE_URL: &str = "https://api.groq.com/openai/v1";

// Request/response types for chat completions

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// Response type for transcriptions

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

/// Body of a fenced code block (```json ... ``` or ``` ... ```), or the
/// whole reply trimmed when there is none
fn extract_json(content: &str) -> &str {
    let Some(open) = content.find("```") else {
        return content.trim();
    };
    let rest = &content[open + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.find("```") {
        Some(close) => rest[..close].trim(),
        None => content.trim(),
    }
}

/// Parse the model's reply into a transaction, `None` if it is not one
fn parse_analysis(content: &str) -> Option<TransactionAnalysis> {
    match serde_json::from_str(extract_json(content)) {
        Ok(analysis) => Some(analysis),
        Err(e) => {
            warn!(error = %e, "analysis reply is not a transaction");
            None
        }
    }
}

fn url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Transaction analyzer on Groq chat completions
pub struct GroqTextAnalyzer {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GroqTextAnalyzer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_model(api_key, DEFAULT_TEXT_MODEL)
    }

    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: API_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TextAnalyzer for GroqTextAnalyzer {
    async fn analyze(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Option<TransactionAnalysis>, AnalysisError> {
        debug!(model = %self.model, "requesting chat completion");

        let body = ChatRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(url(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(AnalysisError::InvalidApiKey);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AnalysisError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AnalysisError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        // An unreadable envelope is as unusable as an unreadable reply.
        let response: ChatResponse = match response.json().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "chat completion envelope is malformed");
                return Ok(None);
            }
        };

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        Ok(parse_analysis(&content))
    }
}

/// Speech-to-text on Groq's Whisper endpoint
pub struct GroqTranscriber {
    api_key: String,
    model: String,
    language: String,
    base_url: String,
    client: reqwest::Client,
}

impl GroqTranscriber {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_model(api_key, DEFAULT_TRANSCRIPTION_MODEL, DEFAULT_LANGUAGE)
    }

    pub fn with_model(
        api_key: impl Into<String>,
        model: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            language: language.into(),
            base_url: API_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_form(&self, audio: &AudioClip) -> Result<Form, TranscriptionError> {
        let file = Part::bytes(audio.data().to_vec())
            .file_name(audio.file_name())
            .mime_str(audio.format().mime_type())
            .map_err(|e| TranscriptionError::RequestFailed(e.to_string()))?;

        Ok(Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "json"))
    }
}

#[async_trait]
impl Transcriber for GroqTranscriber {
    async fn transcribe(&self, audio: &AudioClip) -> Result<String, TranscriptionError> {
        debug!(
            model = %self.model,
            size = %audio.human_readable_size(),
            "uploading audio for transcription"
        );

        let form = self.build_form(audio)?;

        let response = self
            .client
            .post(url(&self.base_url, "audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(TranscriptionError::InvalidApiKey);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TranscriptionError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TranscriptionError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let response: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::ParseError(e.to_string()))?;

        let text = response.text.unwrap_or_default();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TranscriptionError::EmptyResponse);
        }

        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::TransactionType;
    use crate::domain::voice::AudioFormat;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [ { "index": 0, "message": { "role": "assistant", "content": content } } ]
        })
    }

    fn clip() -> AudioClip {
        AudioClip::new(b"webm-bytes".to_vec(), AudioFormat::Webm).unwrap()
    }

    #[test]
    fn extract_json_from_fenced_block() {
        let reply = "Here you go:\n```json\n{\"amount\": 4}\n```\nAnything else?";
        assert_eq!(extract_json(reply), "{\"amount\": 4}");
    }

    #[test]
    fn extract_json_from_bare_fence() {
        assert_eq!(extract_json("```\n{}\n```"), "{}");
    }

    #[test]
    fn extract_json_without_fence() {
        assert_eq!(extract_json("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn parse_analysis_rejects_prose() {
        assert!(parse_analysis("I could not find a transaction.").is_none());
        assert!(parse_analysis("{\"amount\": 12}").is_none());
    }

    #[tokio::test]
    async fn analyze_parses_fenced_reply() {
        let server = MockServer::start().await;
        let reply = "```json\n{\"amount\": 45, \"description\": \"Cena fuori\", \
                     \"category\": \"Cibo\", \"type\": \"expense\"}\n```";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer gsk_test"))
            .and(body_partial_json(json!({ "model": DEFAULT_TEXT_MODEL })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
            .expect(1)
            .mount(&server)
            .await;

        let analyzer = GroqTextAnalyzer::new("gsk_test").with_base_url(server.uri());
        let analysis = analyzer
            .analyze(&[ChatMessage::user("Cena fuori 45 euro")])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(analysis.amount, 45.0);
        assert_eq!(analysis.category, "Cibo");
        assert_eq!(analysis.kind, TransactionType::Expense);
    }

    #[tokio::test]
    async fn analyze_malformed_reply_is_none() {
        let server = MockServer::start().await;
        Mock::given(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("no idea")))
            .mount(&server)
            .await;

        let analyzer = GroqTextAnalyzer::new("k").with_base_url(server.uri());
        let result = analyzer.analyze(&[ChatMessage::user("hmm")]).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn analyze_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let analyzer = GroqTextAnalyzer::new("k").with_base_url(server.uri());
        assert!(matches!(
            analyzer.analyze(&[ChatMessage::user("x")]).await,
            Err(AnalysisError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn transcribe_uploads_multipart_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("authorization", "Bearer gsk_test"))
            .and(body_string_contains("filename=\"audio.webm\""))
            .and(body_string_contains("whisper-large-v3"))
            .and(body_string_contains("name=\"language\""))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "text": "  Spesa 20 euro " })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transcriber = GroqTranscriber::new("gsk_test").with_base_url(server.uri());
        let text = transcriber.transcribe(&clip()).await.unwrap();

        assert_eq!(text, "Spesa 20 euro");
    }

    #[tokio::test]
    async fn transcribe_blank_text_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "   " })))
            .mount(&server)
            .await;

        let transcriber = GroqTranscriber::new("k").with_base_url(server.uri());
        assert!(matches!(
            transcriber.transcribe(&clip()).await,
            Err(TranscriptionError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn transcribe_rejected_key() {
        let server = MockServer::start().await;
        Mock::given(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transcriber = GroqTranscriber::new("bad").with_base_url(server.uri());
        assert!(matches!(
            transcriber.transcribe(&clip()).await,
            Err(TranscriptionError::InvalidApiKey)
        ));
    }
}
