//! groq-whisper-stt — host bridge for the Groq Whisper integration.
//!
//! Plays the host role over JSON-line IPC on stdin/stdout: config entries are
//! created, reconfigured and removed on command, and raw PCM files are streamed
//! through the entity for transcription.

use std::sync::Arc;

use tracing::{info, warn};

use groq_whisper_stt::config::paths::get_log_dir;
use groq_whisper_stt::config::{get_entries_path, read_stored_entries};
use groq_whisper_stt::ipc::bridge::{emit_event, spawn_stdin_reader, StdoutEvents};
use groq_whisper_stt::ipc::host::Host;
use groq_whisper_stt::ipc::HostEvent;
use groq_whisper_stt::logging;
use groq_whisper_stt::ConfigValidator;

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init(&get_log_dir()) {
        logging::init_console();
        warn!("File logging unavailable: {:#}", e);
    }

    emit_event(&HostEvent::Starting {});

    let mut host = Host::new(
        ConfigValidator::new(),
        Arc::new(StdoutEvents),
        Some(get_entries_path()),
    );
    let restored = host.restore_entries(read_stored_entries());

    let mut cmd_rx = spawn_stdin_reader();

    emit_event(&HostEvent::Ready {});
    info!(entries = restored, "Integration ready");

    loop {
        match cmd_rx.recv().await {
            Some(command) => {
                if !host.handle_command(command).await {
                    break;
                }
            }
            None => {
                info!("stdin closed, shutting down");
                host.shutdown().await;
                break;
            }
        }
    }

    info!("Integration shutting down");
}
