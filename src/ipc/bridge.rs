//! IPC bridge: stdin command reader, stdout event emitter, and the entity
//! sink that forwards status changes to the host.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use super::{HostCommand, HostEvent};
use crate::entry::EntitySink;
use crate::stt::{EntityStatus, GroqWhisperStt, StatusListener};

/// Emit a `HostEvent` as a JSON line on stdout and flush.
pub fn emit_event(event: &HostEvent) {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            return;
        }
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    // Pipe may be closed.
    let _ = writeln!(handle, "{}", json);
    let _ = handle.flush();
}

/// Convenience helper for emitting error events.
pub fn emit_error(message: &str) {
    emit_event(&HostEvent::Error {
        message: message.to_string(),
    });
}

/// Spawn a blocking thread that reads JSON lines from stdin, deserializes
/// them into `HostCommand`, and forwards them through the returned channel.
///
/// The thread exits when stdin is closed or on unrecoverable read error.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<HostCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        let reader = stdin.lock();
        for line in reader.lines() {
            match line {
                Ok(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<HostCommand>(trimmed) {
                        Ok(cmd) => {
                            debug!("Received {} command", command_name(&cmd));
                            if tx.send(cmd).is_err() {
                                break; // main task is gone
                            }
                        }
                        Err(e) => {
                            // The line may hold an API key, so it is not echoed.
                            error!("Invalid JSON command: {}", e);
                            emit_error(&format!("Invalid JSON command: {}", e));
                        }
                    }
                }
                Err(e) => {
                    error!("stdin read error: {}", e);
                    break;
                }
            }
        }
        debug!("stdin reader thread exiting");
    });

    rx
}

fn command_name(cmd: &HostCommand) -> &'static str {
    match cmd {
        HostCommand::Ping {} => "ping",
        HostCommand::CreateEntry { .. } => "create_entry",
        HostCommand::ReconfigureEntry { .. } => "reconfigure_entry",
        HostCommand::RemoveEntry { .. } => "remove_entry",
        HostCommand::ListEntries {} => "list_entries",
        HostCommand::Transcribe { .. } => "transcribe",
        HostCommand::Stop {} => "stop",
    }
}

/// Destination for events bound for the host.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: HostEvent);
}

/// Writes events to stdout as JSON lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutEvents;

impl EventSink for StdoutEvents {
    fn emit(&self, event: HostEvent) {
        emit_event(&event);
    }
}

/// Turns entity status transitions into `status` events.
struct StatusForwarder {
    events: Arc<dyn EventSink>,
}

impl StatusListener for StatusForwarder {
    fn status_changed(&self, unique_id: &str, status: &EntityStatus) {
        self.events.emit(HostEvent::Status {
            entry_id: unique_id.to_string(),
            status: status.to_string(),
        });
    }
}

/// Registers entities by publishing their status transitions as
/// `status` events.
pub struct IpcEntitySink {
    forwarder: Arc<StatusForwarder>,
}

impl IpcEntitySink {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            forwarder: Arc::new(StatusForwarder { events }),
        }
    }
}

impl EntitySink for IpcEntitySink {
    fn add_entity(&mut self, entity: Arc<GroqWhisperStt>) {
        debug!(entry_id = entity.unique_id(), "Entity registered");
    }

    fn remove_entity(&mut self, unique_id: &str) {
        debug!(entry_id = unique_id, "Entity unregistered");
    }

    fn status_listener(&self) -> Option<Arc<dyn StatusListener>> {
        Some(self.forwarder.clone() as Arc<dyn StatusListener>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, SttConfig};
    use crate::entry::ConfigEntries;
    use crate::stt::{AudioChannel, AudioSampleRate, SpeechMetadata, SpeechToText};
    use crate::ConfigValidator;
    use futures_util::stream;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEvents(Mutex<Vec<HostEvent>>);

    impl EventSink for RecordingEvents {
        fn emit(&self, event: HostEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn test_status_events_follow_transitions_in_order() {
        let events = Arc::new(RecordingEvents::default());
        let mut entries = ConfigEntries::new(
            ConfigValidator::new(),
            IpcEntitySink::new(events.clone()),
        );
        let config = SttConfig {
            name: "Groq".into(),
            url: "http://127.0.0.1:9".into(),
            api_key: ApiKey::new("gsk_test"),
            model: "whisper-large-v3".into(),
            temperature: 0.4,
            prompt: String::new(),
        };
        entries.restore_entry("entry-1".into(), &config);

        let entity = entries.entity("entry-1").unwrap();
        let metadata = SpeechMetadata::pcm("en", AudioSampleRate::Hz16000, AudioChannel::Mono);
        entity
            .process_audio_stream(&metadata, stream::iter(Vec::<Vec<u8>>::new()))
            .await;

        // Published before the call returned, nothing merged.
        let status = |s: &str| HostEvent::Status {
            entry_id: "entry-1".into(),
            status: s.into(),
        };
        assert_eq!(
            *events.0.lock().unwrap(),
            vec![status("processing"), status("error: no audio received")]
        );
    }
}
