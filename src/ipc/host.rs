//! Host command handling: entry lifecycle, listings and file transcription.
//!
//! Each transcription runs as its own task, so the command loop keeps
//! answering while a request is in flight. Sessions on the same entity still
//! run one after another.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::{future, StreamExt};
use tokio::fs::File;
use tokio::task::JoinSet;
use tokio_util::io::ReaderStream;
use tracing::{error, info, info_span, warn, Instrument};

use super::bridge::{EventSink, IpcEntitySink};
use super::{EntryInfo, HostCommand, HostEvent};
use crate::config::validate::ConfigValidator;
use crate::config::{write_stored_entries, ConfigInput, StoredEntries, DEFAULT_NAME};
use crate::entry::{ConfigEntries, EntryError};
use crate::stt::{AudioChannel, AudioSampleRate, GroqWhisperStt, SpeechMetadata, SpeechToText};

/// Read size used when streaming a PCM file into the entity.
pub const CHUNK_SIZE: usize = 64 * 1024;

pub type Entries = ConfigEntries<IpcEntitySink>;

/// The integration as seen from the host process.
pub struct Host {
    entries: Entries,
    events: Arc<dyn EventSink>,
    /// Where entries are persisted after every change. `None` keeps them in
    /// memory only.
    entries_path: Option<PathBuf>,
    sessions: JoinSet<()>,
}

impl Host {
    pub fn new(
        validator: ConfigValidator,
        events: Arc<dyn EventSink>,
        entries_path: Option<PathBuf>,
    ) -> Self {
        Self {
            entries: ConfigEntries::new(validator, IpcEntitySink::new(events.clone())),
            events,
            entries_path,
            sessions: JoinSet::new(),
        }
    }

    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    /// Set up entries from earlier sessions. They were validated when
    /// created, so only the schema is checked. Returns how many were loaded.
    pub fn restore_entries(&mut self, stored: StoredEntries) -> usize {
        let mut restored = 0;
        for stored in stored.entries {
            match stored.config.into_config() {
                Ok(config) => {
                    self.entries.restore_entry(stored.entry_id, &config);
                    restored += 1;
                }
                Err(e) => warn!(entry_id = %stored.entry_id, "Skipping stored entry: {}", e),
            }
        }
        restored
    }

    /// Handle a single command from the host.
    /// Returns `false` if the main loop should exit.
    pub async fn handle_command(&mut self, cmd: HostCommand) -> bool {
        self.reap_sessions();

        match cmd {
            HostCommand::Ping {} => self.emit(HostEvent::Pong {}),

            HostCommand::Stop {} => {
                self.emit(HostEvent::Stopping {});
                self.shutdown().await;
                return false;
            }

            HostCommand::CreateEntry { config } => {
                let title = title_of(&config);
                match self.entries.create_entry(config).await {
                    Ok(entry_id) => {
                        self.persist_entries();
                        self.emit(HostEvent::EntryCreated { entry_id, title });
                    }
                    Err(e) => self.emit_entry_error(&e),
                }
            }

            HostCommand::ReconfigureEntry { entry_id, config } => {
                let title = title_of(&config);
                match self.entries.reconfigure_entry(&entry_id, config).await {
                    Ok(()) => {
                        self.persist_entries();
                        self.emit(HostEvent::EntryUpdated { entry_id, title });
                    }
                    Err(e) => self.emit_entry_error(&e),
                }
            }

            HostCommand::RemoveEntry { entry_id } => match self.entries.remove_entry(&entry_id) {
                Ok(()) => {
                    self.persist_entries();
                    self.emit(HostEvent::EntryRemoved { entry_id });
                }
                Err(e) => self.emit_error(e.to_string()),
            },

            HostCommand::ListEntries {} => {
                let mut list: Vec<EntryInfo> = self
                    .entries
                    .entities()
                    .map(|entity| EntryInfo {
                        entry_id: entity.unique_id().to_string(),
                        name: entity.name().to_string(),
                        status: entity.status().to_string(),
                    })
                    .collect();
                list.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
                self.emit(HostEvent::Entries { entries: list });
            }

            HostCommand::Transcribe {
                entry_id,
                path,
                language,
                channel,
                sample_rate,
            } => self.start_transcription(entry_id, path, language, channel, sample_rate),
        }

        true
    }

    /// Wait for every transcription started so far to finish.
    pub async fn finish_sessions(&mut self) {
        while let Some(done) = self.sessions.join_next().await {
            log_session_end(done);
        }
    }

    /// Abandon in-flight transcriptions.
    pub async fn shutdown(&mut self) {
        if !self.sessions.is_empty() {
            info!(sessions = self.sessions.len(), "Abandoning in-flight transcriptions");
        }
        self.sessions.shutdown().await;
    }

    fn start_transcription(
        &mut self,
        entry_id: String,
        path: PathBuf,
        language: String,
        channel: u16,
        sample_rate: u32,
    ) {
        let Some(entity) = self.entries.entity(&entry_id) else {
            self.emit_error(format!("Unknown config entry: {}", entry_id));
            return;
        };

        let (Ok(rate), Ok(channels)) = (
            AudioSampleRate::try_from(sample_rate),
            AudioChannel::try_from(channel),
        ) else {
            self.emit_error(format!(
                "Unsupported audio: {} channel(s) at {} Hz",
                channel, sample_rate
            ));
            return;
        };

        let metadata = SpeechMetadata::pcm(&language, rate, channels);
        if !entity.is_supported(&metadata) {
            warn!(?metadata, "Audio outside advertised capabilities, sending anyway");
        }

        let span = info_span!("transcribe_file", entry_id = %entry_id);
        self.sessions.spawn(
            transcribe_file(entity, self.events.clone(), path, metadata).instrument(span),
        );
    }

    fn reap_sessions(&mut self) {
        while let Some(done) = self.sessions.try_join_next() {
            log_session_end(done);
        }
    }

    fn persist_entries(&self) {
        let Some(path) = &self.entries_path else {
            return;
        };
        if let Err(e) = write_stored_entries(path, &self.entries.stored_entries()) {
            warn!("Failed to save config entries: {:#}", e);
        }
    }

    fn emit(&self, event: HostEvent) {
        self.events.emit(event);
    }

    fn emit_error(&self, message: String) {
        self.emit(HostEvent::Error { message });
    }

    fn emit_entry_error(&self, err: &EntryError) {
        let form = err.form_error();
        self.emit(HostEvent::FormError {
            field: form.field.to_string(),
            error: form.code,
        });
    }
}

fn log_session_end(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        if e.is_panic() {
            error!("Transcription task panicked: {}", e);
        }
    }
}

fn title_of(input: &ConfigInput) -> String {
    input.name.clone().unwrap_or_else(|| DEFAULT_NAME.to_string())
}

/// Stream a raw PCM file through `entity` and report the result.
///
/// The file is read in `CHUNK_SIZE` pieces, so an oversized file is
/// rejected once the entity's ceiling is crossed instead of after a full
/// read. A read error ends the stream early.
async fn transcribe_file(
    entity: Arc<GroqWhisperStt>,
    events: Arc<dyn EventSink>,
    path: PathBuf,
    metadata: SpeechMetadata,
) {
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            events.emit(HostEvent::Error {
                message: format!("Failed to read {}: {}", path.display(), e),
            });
            return;
        }
    };

    let chunks = ReaderStream::with_capacity(file, CHUNK_SIZE).scan((), |_, chunk| {
        future::ready(match chunk {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Audio file read failed, ending stream: {}", e);
                None
            }
        })
    });

    let result = entity.process_audio_stream(&metadata, chunks).await;

    events.emit(HostEvent::Transcription {
        entry_id: entity.unique_id().to_string(),
        success: result.is_success(),
        text: result.text,
    });
}
