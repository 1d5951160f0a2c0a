//! Usage kind value object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::InvalidUsageKindError;

/// All AI actions that are metered per day
pub const ALL_USAGE_KINDS: &[UsageKind] = &[UsageKind::Transcription, UsageKind::NaturalInput];

/// An AI-assisted action with its own daily quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    /// Voice recording transcribed to text
    Transcription,
    /// Free-text transaction description parsed by the AI text service
    NaturalInput,
}

impl UsageKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::NaturalInput => "natural_input",
        }
    }

    /// Human-readable label used in user-facing messages
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Transcription => "AI transcriptions",
            Self::NaturalInput => "AI natural inputs",
        }
    }
}

impl FromStr for UsageKind {
    type Err = InvalidUsageKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "transcription" => Ok(Self::Transcription),
            "natural_input" => Ok(Self::NaturalInput),
            _ => Err(InvalidUsageKindError {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
