//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{AiConfig, AppConfig, StoreBackend};
use crate::domain::error::ConfigError;
use crate::domain::schedule::Interval;

use super::args::{is_valid_config_key, ConfigAction, SECRET_CONFIG_KEYS, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    validate_config_value(key, value)?;

    let mut config = store.load().await?;
    set_value(&mut config, key, value.trim().to_string());
    store.save(&config).await?;

    presenter.success(&format!("{} = {}", key, display_value(key, value.trim())));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    match get_value(&config, key) {
        Some(v) => presenter.output(&display_value(key, &v)),
        None => presenter.output("(not set)"),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        let value = get_value(&config, key)
            .map(|v| display_value(key, &v))
            .unwrap_or_else(|| "(not set)".to_string());
        presenter.key_value(key, &value);
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn set_value(config: &mut AppConfig, key: &str, value: String) {
    match key {
        "store" => config.store = Some(value.to_lowercase()),
        "database_path" => config.database_path = Some(value),
        "backend_url" => config.backend_url = Some(value),
        "backend_anon_key" => config.backend_anon_key = Some(value),
        "service_key" => config.service_key = Some(value),
        "payment_api_key" => config.payment_api_key = Some(value),
        "payment_api_base" => config.payment_api_base = Some(value),
        "ai_api_key" => config.ai_api_key = Some(value),
        "sync_interval" => config.sync_interval = Some(value),
        "sync_timeout" => config.sync_timeout = Some(value),
        _ => {
            let ai = config.ai.get_or_insert_with(AiConfig::default);
            match key {
                "ai.text_model" => ai.text_model = Some(value),
                "ai.transcription_model" => ai.transcription_model = Some(value),
                "ai.language" => ai.language = Some(value),
                _ => unreachable!(), // Already validated
            }
        }
    }
}

fn get_value(config: &AppConfig, key: &str) -> Option<String> {
    let ai = config.ai.as_ref();
    match key {
        "store" => config.store.clone(),
        "database_path" => config.database_path.clone(),
        "backend_url" => config.backend_url.clone(),
        "backend_anon_key" => config.backend_anon_key.clone(),
        "service_key" => config.service_key.clone(),
        "payment_api_key" => config.payment_api_key.clone(),
        "payment_api_base" => config.payment_api_base.clone(),
        "ai_api_key" => config.ai_api_key.clone(),
        "sync_interval" => config.sync_interval.clone(),
        "sync_timeout" => config.sync_timeout.clone(),
        "ai.text_model" => ai.and_then(|a| a.text_model.clone()),
        "ai.transcription_model" => ai.and_then(|a| a.transcription_model.clone()),
        "ai.language" => ai.and_then(|a| a.language.clone()),
        _ => unreachable!(),
    }
}

fn display_value(key: &str, value: &str) -> String {
    if SECRET_CONFIG_KEYS.contains(&key) {
        mask_secret(value)
    } else {
        value.to_string()
    }
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::ValidationError {
        key: key.to_string(),
        message,
    };

    match key {
        "store" => {
            value.parse::<StoreBackend>()?;
        }
        "sync_interval" | "sync_timeout" => {
            value
                .parse::<Interval>()
                .map_err(|e| invalid(e.to_string()))?;
        }
        "backend_url" | "payment_api_base" => {
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                return Err(invalid("Value must be an http(s) URL".to_string()));
            }
        }
        "ai.language" => {
            let valid = value.len() == 2 && value.chars().all(|c| c.is_ascii_lowercase());
            if !valid {
                return Err(invalid(
                    "Value must be a two-letter ISO-639-1 code (e.g., it, en)".to_string(),
                ));
            }
        }
        _ => {
            if value.trim().is_empty() {
                return Err(invalid("Value must not be empty".to_string()));
            }
        }
    }
    Ok(())
}

/// Mask a secret for display (show first 4 and last 4 chars)
fn mask_secret(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}
