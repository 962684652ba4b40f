//! Speech-to-text entity surface.
//!
//! `SpeechToText` is the capability set the host drives. `cloud::GroqWhisperStt`
//! implements it on top of the Groq transcription API.

pub mod cloud;
pub mod wav;

use std::fmt;

use futures_util::Stream;
use serde::{Deserialize, Serialize};

pub use cloud::{setup_entry, GroqWhisperStt};

/// Languages advertised to the host.
pub const SUPPORTED_LANGUAGES: &[&str] = &["zh", "en"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Ogg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Pcm,
    Opus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioBitRate {
    Bits8,
    Bits16,
    Bits24,
    Bits32,
}

impl AudioBitRate {
    pub fn bits(self) -> u16 {
        match self {
            Self::Bits8 => 8,
            Self::Bits16 => 16,
            Self::Bits24 => 24,
            Self::Bits32 => 32,
        }
    }
}

impl TryFrom<u16> for AudioBitRate {
    type Error = u16;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(Self::Bits8),
            16 => Ok(Self::Bits16),
            24 => Ok(Self::Bits24),
            32 => Ok(Self::Bits32),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSampleRate {
    Hz8000,
    Hz11000,
    Hz16000,
    Hz18900,
    Hz22000,
    Hz32000,
    Hz37800,
    Hz44100,
    Hz48000,
}

impl AudioSampleRate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Hz8000 => 8_000,
            Self::Hz11000 => 11_000,
            Self::Hz16000 => 16_000,
            Self::Hz18900 => 18_900,
            Self::Hz22000 => 22_000,
            Self::Hz32000 => 32_000,
            Self::Hz37800 => 37_800,
            Self::Hz44100 => 44_100,
            Self::Hz48000 => 48_000,
        }
    }
}

impl TryFrom<u32> for AudioSampleRate {
    type Error = u32;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        match hz {
            8_000 => Ok(Self::Hz8000),
            11_000 => Ok(Self::Hz11000),
            16_000 => Ok(Self::Hz16000),
            18_900 => Ok(Self::Hz18900),
            22_000 => Ok(Self::Hz22000),
            32_000 => Ok(Self::Hz32000),
            37_800 => Ok(Self::Hz37800),
            44_100 => Ok(Self::Hz44100),
            48_000 => Ok(Self::Hz48000),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioChannel {
    Mono,
    Stereo,
}

impl AudioChannel {
    pub fn count(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

impl TryFrom<u16> for AudioChannel {
    type Error = u16;

    fn try_from(count: u16) -> Result<Self, Self::Error> {
        match count {
            1 => Ok(Self::Mono),
            2 => Ok(Self::Stereo),
            other => Err(other),
        }
    }
}

/// Per-session audio description supplied by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechMetadata {
    pub language: String,
    pub format: AudioFormat,
    pub codec: AudioCodec,
    pub bit_rate: AudioBitRate,
    pub sample_rate: AudioSampleRate,
    pub channel: AudioChannel,
}

impl SpeechMetadata {
    /// 16-bit PCM WAV, the only shape this integration accepts.
    pub fn pcm(language: &str, sample_rate: AudioSampleRate, channel: AudioChannel) -> Self {
        Self {
            language: language.to_string(),
            format: AudioFormat::Wav,
            codec: AudioCodec::Pcm,
            bit_rate: AudioBitRate::Bits16,
            sample_rate,
            channel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechResultState {
    Success,
    Error,
}

/// Outcome of one transcription. An error result never carries text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechResult {
    pub text: String,
    pub result: SpeechResultState,
}

impl SpeechResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            result: SpeechResultState::Success,
        }
    }

    pub fn error() -> Self {
        Self {
            text: String::new(),
            result: SpeechResultState::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == SpeechResultState::Success
    }
}

/// Why a single transcription call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptionError {
    #[error("audio exceeds size limit")]
    AudioTooLarge,
    #[error("no audio received")]
    NoAudioReceived,
    #[error("no transcription received")]
    NoTranscriptionReceived,
    #[error("request exception")]
    RequestException(String),
}

/// Status label shown on the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityStatus {
    Ready,
    Processing,
    Success,
    Error(TranscriptionError),
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Processing => write!(f, "processing"),
            Self::Success => write!(f, "success"),
            Self::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Receives each status transition of an entity, in order, on the task that
/// made the transition. Must not call back into the entity.
pub trait StatusListener: Send + Sync {
    fn status_changed(&self, unique_id: &str, status: &EntityStatus);
}

/// Capability surface the host drives for each speech session.
#[allow(async_fn_in_trait)]
pub trait SpeechToText: Send + Sync {
    /// Consume `stream` fully, then transcribe it.
    async fn process_audio_stream<S, B>(&self, metadata: &SpeechMetadata, stream: S) -> SpeechResult
    where
        S: Stream<Item = B> + Send,
        B: AsRef<[u8]> + Send;

    /// Current status label.
    fn status(&self) -> EntityStatus;

    fn supported_languages(&self) -> &'static [&'static str];
    fn supported_formats(&self) -> &'static [AudioFormat];
    fn supported_codecs(&self) -> &'static [AudioCodec];
    fn supported_bit_rates(&self) -> &'static [AudioBitRate];
    fn supported_sample_rates(&self) -> &'static [AudioSampleRate];
    fn supported_channels(&self) -> &'static [AudioChannel];

    /// Whether `metadata` falls inside the advertised capabilities.
    fn is_supported(&self, metadata: &SpeechMetadata) -> bool {
        self.supported_languages().contains(&metadata.language.as_str())
            && self.supported_formats().contains(&metadata.format)
            && self.supported_codecs().contains(&metadata.codec)
            && self.supported_bit_rates().contains(&metadata.bit_rate)
            && self.supported_sample_rates().contains(&metadata.sample_rate)
            && self.supported_channels().contains(&metadata.channel)
    }
}
