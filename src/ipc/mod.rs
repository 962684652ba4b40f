//! IPC protocol types for driving the integration from a host process.
//!
//! Events use `{"event": "<name>", "data": {...}}` format (integration -> host).
//! Commands use `{"command": "<name>", ...}` format (host -> integration).

pub mod bridge;
pub mod host;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ConfigInput;

// ---------------------------------------------------------------------------
// Events: integration -> host (stdout)
// ---------------------------------------------------------------------------

/// All events emitted to the host via stdout as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum HostEvent {
    Starting {},
    Ready {},
    Pong {},
    EntryCreated { entry_id: String, title: String },
    EntryUpdated { entry_id: String, title: String },
    EntryRemoved { entry_id: String },
    Entries { entries: Vec<EntryInfo> },
    FormError { field: String, error: String },
    Status { entry_id: String, status: String },
    Transcription {
        entry_id: String,
        text: String,
        success: bool,
    },
    Error { message: String },
    Stopping {},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub entry_id: String,
    pub name: String,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Commands: host -> integration (stdin)
// ---------------------------------------------------------------------------

fn default_channel() -> u16 {
    1
}

fn default_sample_rate() -> u32 {
    16_000
}

/// All commands received from the host via stdin as JSON lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum HostCommand {
    Ping {},
    CreateEntry {
        #[serde(default)]
        config: ConfigInput,
    },
    ReconfigureEntry {
        entry_id: String,
        #[serde(default)]
        config: ConfigInput,
    },
    RemoveEntry {
        entry_id: String,
    },
    ListEntries {},
    /// Transcribe a raw 16-bit PCM file.
    Transcribe {
        entry_id: String,
        path: PathBuf,
        language: String,
        #[serde(default = "default_channel")]
        channel: u16,
        #[serde(default = "default_sample_rate")]
        sample_rate: u32,
    },
    Stop {},
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcribe_command_defaults() {
        let cmd: HostCommand = serde_json::from_str(
            r#"{"command": "transcribe", "entry_id": "e1", "path": "/tmp/a.pcm", "language": "en"}"#,
        )
        .unwrap();
        match cmd {
            HostCommand::Transcribe {
                channel,
                sample_rate,
                language,
                ..
            } => {
                assert_eq!(channel, 1);
                assert_eq!(sample_rate, 16_000);
                assert_eq!(language, "en");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_create_entry_command() {
        let cmd: HostCommand = serde_json::from_str(
            r#"{"command": "create_entry", "config": {"url": "https://proxy.example.com", "api_key": "gsk_x", "temperature": 0.2}}"#,
        )
        .unwrap();
        match cmd {
            HostCommand::CreateEntry { config } => {
                assert_eq!(config.url.as_deref(), Some("https://proxy.example.com"));
                assert_eq!(config.temperature, Some(0.2));
                assert!(config.model.is_none());
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_event_shape() {
        let json = serde_json::to_string(&HostEvent::Status {
            entry_id: "e1".into(),
            status: "processing".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"event":"status","data":{"entry_id":"e1","status":"processing"}}"#
        );

        let json = serde_json::to_string(&HostEvent::Ready {}).unwrap();
        assert_eq!(json, r#"{"event":"ready","data":{}}"#);
    }
}
