//! Groq Whisper speech-to-text integration.
//!
//! Validates a user configuration against the Groq API, registers one
//! speech-to-text entity per config entry, and transcribes buffered PCM audio
//! through the `/openai/v1/audio/transcriptions` endpoint.

pub mod config;
pub mod dispatch;
pub mod entry;
pub mod ipc;
pub mod logging;
pub mod stt;

pub use config::validate::ConfigValidator;
pub use config::{ApiKey, ConfigError, ConfigInput, SttConfig};
pub use entry::{ConfigEntries, EntitySink, EntryError};
pub use stt::{
    EntityStatus, GroqWhisperStt, SpeechMetadata, SpeechResult, SpeechResultState, SpeechToText,
    StatusListener, TranscriptionError,
};
