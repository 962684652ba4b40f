//! Groq Whisper transcription entity.
//!
//! Buffers the whole audio stream, frames it as WAV and posts it to
//! `{base}/openai/v1/audio/transcriptions` as multipart form data.

use std::pin::pin;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::{Stream, StreamExt};
use reqwest::multipart;
use serde::Deserialize;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use super::wav::encode_pcm_wav;
use super::{
    AudioBitRate, AudioChannel, AudioCodec, AudioFormat, AudioSampleRate, EntityStatus,
    SpeechMetadata, SpeechResult, SpeechToText, StatusListener, TranscriptionError,
    SUPPORTED_LANGUAGES,
};
use crate::config::SttConfig;
use crate::dispatch::dispatch;

pub const TRANSCRIPTIONS_PATH: &str = "/openai/v1/audio/transcriptions";

/// Upload ceiling in MiB. The remote rejects anything near 25 MB.
pub const MAX_AUDIO_MIB: f64 = 24.5;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// True once `len` bytes is past the upload ceiling.
pub fn exceeds_size_limit(len: usize) -> bool {
    len as f64 / BYTES_PER_MIB > MAX_AUDIO_MIB
}

/// Temperature as a form value. Whole numbers keep their decimal point
/// (`1.0`, not `1`).
fn form_temperature(temperature: f64) -> String {
    format!("{:?}", temperature)
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Build the entity for a config entry.
pub fn setup_entry(entry_id: &str, config: &SttConfig) -> GroqWhisperStt {
    if config.url.is_empty() {
        info!(entry_id, "No proxy URL configured");
    } else {
        info!(entry_id, url = %config.url, "Using proxy URL");
    }
    GroqWhisperStt::new(config.clone(), entry_id)
}

/// Speech-to-text entity bound to one validated configuration.
pub struct GroqWhisperStt {
    config: SttConfig,
    unique_id: String,
    status: Mutex<EntityStatus>,
    listener: Option<Arc<dyn StatusListener>>,
    /// Held for a whole session: one request in flight per entity.
    session: tokio::sync::Mutex<()>,
    client: reqwest::Client,
    span: Span,
}

impl GroqWhisperStt {
    pub fn new(config: SttConfig, unique_id: impl Into<String>) -> Self {
        let unique_id = unique_id.into();
        let span = info_span!("stt_entity", name = %config.name, unique_id = %unique_id);
        Self {
            config,
            unique_id,
            status: Mutex::new(EntityStatus::Ready),
            listener: None,
            session: tokio::sync::Mutex::new(()),
            client: reqwest::Client::new(),
            span,
        }
    }

    /// Publish every status transition to `listener` before the transition
    /// returns.
    pub fn with_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn config(&self) -> &SttConfig {
        &self.config
    }

    fn set_status(&self, status: EntityStatus) {
        debug!(status = %status, "Entity status changed");
        let mut current = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(listener) = &self.listener {
            listener.status_changed(&self.unique_id, &status);
        }
        *current = status;
    }

    fn fail(&self, err: TranscriptionError) -> SpeechResult {
        match &err {
            TranscriptionError::RequestException(cause) => {
                warn!(cause = %cause, "Transcription request failed")
            }
            other => warn!("Transcription failed: {}", other),
        }
        self.set_status(EntityStatus::Error(err));
        SpeechResult::error()
    }

    async fn transcribe(&self, wav: Vec<u8>, language: &str) -> Result<String, TranscriptionError> {
        let url = format!("{}{}", self.config.url, TRANSCRIPTIONS_PATH);
        debug!(bytes = wav.len(), url = %url, "Sending audio to Groq Whisper API");

        let file_part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::RequestException(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.config.model.clone())
            .text("language", language.to_string())
            .text("temperature", form_temperature(self.config.temperature))
            .text("prompt", self.config.prompt.clone())
            .text("response_format", "json");

        let request = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose())
            .multipart(form)
            .send();

        let resp = dispatch(request)
            .await
            .map_err(|e| TranscriptionError::RequestException(e.to_string()))?;

        let status = resp.status();
        let body: TranscriptionResponse = resp.json().await.map_err(|e| {
            TranscriptionError::RequestException(format!("HTTP {}: {}", status, e))
        })?;

        match body.text {
            Some(text) if !text.is_empty() => Ok(text),
            _ => {
                debug!(status = status.as_u16(), "Response carried no text");
                Err(TranscriptionError::NoTranscriptionReceived)
            }
        }
    }
}

impl SpeechToText for GroqWhisperStt {
    async fn process_audio_stream<S, B>(&self, metadata: &SpeechMetadata, stream: S) -> SpeechResult
    where
        S: Stream<Item = B> + Send,
        B: AsRef<[u8]> + Send,
    {
        async move {
            let _session = self.session.lock().await;
            self.set_status(EntityStatus::Processing);

            let mut stream = pin!(stream);
            let mut data = Vec::new();
            while let Some(chunk) = stream.next().await {
                data.extend_from_slice(chunk.as_ref());
                if exceeds_size_limit(data.len()) {
                    return self.fail(TranscriptionError::AudioTooLarge);
                }
            }

            if data.is_empty() {
                return self.fail(TranscriptionError::NoAudioReceived);
            }

            let wav = encode_pcm_wav(&data, metadata.channel.count(), metadata.sample_rate.hz());
            drop(data);

            match self.transcribe(wav, &metadata.language).await {
                Ok(text) => {
                    info!(chars = text.chars().count(), "Transcription complete");
                    self.set_status(EntityStatus::Success);
                    SpeechResult::success(text)
                }
                Err(e) => self.fail(e),
            }
        }
        .instrument(self.span.clone())
        .await
    }

    fn status(&self) -> EntityStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        SUPPORTED_LANGUAGES
    }

    fn supported_formats(&self) -> &'static [AudioFormat] {
        &[AudioFormat::Wav]
    }

    fn supported_codecs(&self) -> &'static [AudioCodec] {
        &[AudioCodec::Pcm]
    }

    fn supported_bit_rates(&self) -> &'static [AudioBitRate] {
        &[
            AudioBitRate::Bits8,
            AudioBitRate::Bits16,
            AudioBitRate::Bits24,
            AudioBitRate::Bits32,
        ]
    }

    fn supported_sample_rates(&self) -> &'static [AudioSampleRate] {
        &[
            AudioSampleRate::Hz8000,
            AudioSampleRate::Hz16000,
            AudioSampleRate::Hz44100,
            AudioSampleRate::Hz48000,
        ]
    }

    fn supported_channels(&self) -> &'static [AudioChannel] {
        &[AudioChannel::Mono, AudioChannel::Stereo]
    }
}
