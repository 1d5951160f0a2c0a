//! Configuration domain module

mod app_config;

pub use app_config::{
    AiConfig, AppConfig, StoreBackend, DEFAULT_LANGUAGE, DEFAULT_TEXT_MODEL,
    DEFAULT_TRANSCRIPTION_MODEL,
};
