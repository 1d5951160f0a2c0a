//! AI service adapters

mod groq;

pub use groq::{GroqTextAnalyzer, GroqTranscriber};
