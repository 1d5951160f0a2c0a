//! Audio clip value object

use std::fmt;
use std::path::Path;

use base64::Engine;
use thiserror::Error;

/// Error when audio input cannot be used
#[derive(Debug, Clone, Error)]
pub enum InvalidAudioError {
    #[error("Audio is empty")]
    Empty,

    #[error("Audio is not valid base64: {0}")]
    Base64(String),
}

/// Container formats accepted by the transcription service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioFormat {
    #[default]
    Webm,
    Wav,
    Mp3,
    Ogg,
    Flac,
    M4a,
}

impl AudioFormat {
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Webm => "audio/webm",
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::M4a => "audio/mp4",
        }
    }

    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::M4a => "m4a",
        }
    }

    /// Guess the format from a file extension, defaulting to webm
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "wav" => Self::Wav,
            "mp3" | "mpeg" => Self::Mp3,
            "ogg" | "oga" => Self::Ogg,
            "flac" => Self::Flac,
            "m4a" | "mp4" => Self::M4a,
            _ => Self::Webm,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime_type())
    }
}

/// Recorded voice input ready for transcription
#[derive(Debug, Clone)]
pub struct AudioClip {
    data: Vec<u8>,
    format: AudioFormat,
}

impl AudioClip {
    pub fn new(data: Vec<u8>, format: AudioFormat) -> Result<Self, InvalidAudioError> {
        if data.is_empty() {
            return Err(InvalidAudioError::Empty);
        }
        Ok(Self { data, format })
    }

    /// Decode the base64 payload a browser recorder produces.
    /// A leading `data:<mime>;base64,` prefix is stripped.
    pub fn from_base64(encoded: &str, format: AudioFormat) -> Result<Self, InvalidAudioError> {
        let payload = match encoded.split_once(";base64,") {
            Some((_, rest)) => rest,
            None => encoded,
        };
        let data = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| InvalidAudioError::Base64(e.to_string()))?;
        Self::new(data, format)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Upload file name, e.g. `audio.webm`
    pub fn file_name(&self) -> String {
        format!("audio.{}", self.format.extension())
    }

    pub fn human_readable_size(&self) -> String {
        let bytes = self.data.len();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}
