//! Integration configuration: typed settings, form input and stored entries.

pub mod paths;
pub mod validate;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use paths::get_data_dir;

pub const DEFAULT_NAME: &str = "GroqCloud Whisper";
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-large-v3";
pub const SUPPORTED_MODELS: &[&str] = &[DEFAULT_WHISPER_MODEL];
pub const DEFAULT_TEMPERATURE: f64 = 0.4;
pub const DEFAULT_PROMPT: &str = "";

/// Form field names, as reported in [`FormError::field`].
pub const FIELD_BASE: &str = "base";
pub const FIELD_NAME: &str = "name";
pub const FIELD_URL: &str = "url";
pub const FIELD_API_KEY: &str = "api_key";
pub const FIELD_MODEL: &str = "model";
pub const FIELD_TEMPERATURE: &str = "temperature";

/// Bearer credential for the remote service.
///
/// `Debug` never prints the key, so configs can be logged with `?config`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<api_key>")
    }
}

/// A schema-checked configuration bound to one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SttConfig {
    pub name: String,
    /// Proxy/base URL the transcription request is sent to.
    pub url: String,
    pub api_key: ApiKey,
    pub model: String,
    pub temperature: f64,
    pub prompt: String,
}

/// Raw settings as submitted by the host's configuration form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<ApiKey>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ConfigInput {
    /// Apply defaults and check field shapes. No network I/O.
    ///
    /// The URL shape is left to [`validate::validate_url`] so it is reported
    /// with its own error kind.
    pub fn into_config(self) -> Result<SttConfig, ConfigError> {
        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::InvalidField(FIELD_API_KEY))?;

        let model = self
            .model
            .unwrap_or_else(|| DEFAULT_WHISPER_MODEL.to_string());
        if !SUPPORTED_MODELS.contains(&model.as_str()) {
            return Err(ConfigError::InvalidField(FIELD_MODEL));
        }

        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigError::InvalidField(FIELD_TEMPERATURE));
        }

        let name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_string());
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidField(FIELD_NAME));
        }

        Ok(SttConfig {
            name,
            url: self.url.unwrap_or_default(),
            api_key,
            model,
            temperature,
            prompt: self.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        })
    }
}

impl From<&SttConfig> for ConfigInput {
    fn from(config: &SttConfig) -> Self {
        Self {
            name: Some(config.name.clone()),
            url: Some(config.url.clone()),
            api_key: Some(config.api_key.clone()),
            model: Some(config.model.clone()),
            temperature: Some(config.temperature),
            prompt: Some(config.prompt.clone()),
        }
    }
}

/// Everything that can reject a configuration, from schema to remote check.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrlFormat(&'static str),
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("unauthorized access")]
    Unauthorized,
    #[error("whisper model {0} not found")]
    ModelNotFound(String),
    #[error("unknown error (HTTP {0})")]
    UnknownError(u16),
    #[error("connection error: {0}")]
    ConnectionError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("invalid value for {0}")]
    InvalidField(&'static str),
}

/// Error shown next to a form field, or on the form itself (`base`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormError {
    pub field: &'static str,
    pub code: String,
}

impl FormError {
    pub fn new(field: &'static str, code: impl Into<String>) -> Self {
        Self {
            field,
            code: code.into(),
        }
    }
}

impl ConfigError {
    pub fn form_error(&self) -> FormError {
        match self {
            Self::InvalidUrlFormat(reason) => FormError::new(FIELD_URL, *reason),
            Self::InvalidApiKey => FormError::new(FIELD_API_KEY, "invalid_api_key"),
            Self::Unauthorized => FormError::new(FIELD_BASE, "unauthorized"),
            Self::ModelNotFound(_) => FormError::new(FIELD_BASE, "whisper_model_not_found"),
            Self::UnknownError(_) => FormError::new(FIELD_BASE, "unknown"),
            Self::ConnectionError(_) => FormError::new(FIELD_BASE, "connection_error"),
            Self::InvalidField(field) => FormError::new(*field, "invalid_value"),
        }
    }
}

/// stt_entries.json shape: entries created in earlier sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredEntries {
    #[serde(default)]
    pub entries: Vec<StoredEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub entry_id: String,
    pub config: ConfigInput,
}

/// Path to stt_entries.json.
pub fn get_entries_path() -> PathBuf {
    get_data_dir().join("stt_entries.json")
}

/// Read stt_entries.json from the data directory.
pub fn read_stored_entries() -> StoredEntries {
    read_stored_entries_from(&get_entries_path())
}

pub fn read_stored_entries_from(path: &Path) -> StoredEntries {
    read_json_file(path).unwrap_or_default()
}

/// Write stt_entries.json, creating the data directory if needed.
pub fn write_stored_entries(path: &Path, entries: &StoredEntries) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Generic helper: read a JSON file and deserialize it.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}
