//! Config entries: the host-facing create / reconfigure / remove contract.
//!
//! Each entry owns one entity. Entities are built by [`setup_entry`] and handed
//! to an [`EntitySink`]; on reconfigure the old entity is unloaded and a new
//! one with the same unique id takes its place.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::validate::ConfigValidator;
use crate::config::{ConfigError, ConfigInput, FormError, StoredEntries, StoredEntry, SttConfig, FIELD_BASE};
use crate::stt::{setup_entry, GroqWhisperStt, StatusListener};

/// Where constructed entities are registered with the host.
pub trait EntitySink: Send {
    fn add_entity(&mut self, entity: Arc<GroqWhisperStt>);
    fn remove_entity(&mut self, unique_id: &str);

    /// Attached to every entity built for this sink.
    fn status_listener(&self) -> Option<Arc<dyn StatusListener>> {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("config entry {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

impl EntryError {
    pub fn form_error(&self) -> FormError {
        match self {
            Self::NotFound(_) => FormError::new(FIELD_BASE, "reconfigure_failed"),
            Self::Invalid(e) => e.form_error(),
        }
    }
}

/// All active config entries and their entities.
pub struct ConfigEntries<S: EntitySink> {
    validator: ConfigValidator,
    sink: S,
    entries: HashMap<String, Arc<GroqWhisperStt>>,
}

impl<S: EntitySink> ConfigEntries<S> {
    pub fn new(validator: ConfigValidator, sink: S) -> Self {
        Self {
            validator,
            sink,
            entries: HashMap::new(),
        }
    }

    async fn check(&self, input: ConfigInput) -> Result<SttConfig, ConfigError> {
        let config = input.into_config()?;
        self.validator.validate(&config).await?;
        Ok(config)
    }

    fn load(&mut self, entry_id: String, config: &SttConfig) {
        let mut entity = setup_entry(&entry_id, config);
        if let Some(listener) = self.sink.status_listener() {
            entity = entity.with_listener(listener);
        }
        let entity = Arc::new(entity);
        self.sink.add_entity(Arc::clone(&entity));
        self.entries.insert(entry_id, entity);
    }

    fn unload(&mut self, entry_id: &str) -> bool {
        match self.entries.remove(entry_id) {
            Some(_) => {
                info!(entry_id, "Unloading config entry");
                self.sink.remove_entity(entry_id);
                true
            }
            None => false,
        }
    }

    /// Validate `input` and, on success, create an entry and its entity.
    pub async fn create_entry(&mut self, input: ConfigInput) -> Result<String, EntryError> {
        let config = self.check(input).await?;
        let entry_id = uuid::Uuid::new_v4().to_string();
        info!(entry_id = %entry_id, name = %config.name, "Config entry created");
        self.load(entry_id.clone(), &config);
        Ok(entry_id)
    }

    /// Set up an entry that was validated in an earlier session.
    pub fn restore_entry(&mut self, entry_id: String, config: &SttConfig) {
        info!(entry_id = %entry_id, name = %config.name, "Restoring config entry");
        self.unload(&entry_id);
        self.load(entry_id, config);
    }

    /// Re-validate and replace an entry's configuration, then reload it.
    ///
    /// On any error the existing entity stays active.
    pub async fn reconfigure_entry(
        &mut self,
        entry_id: &str,
        input: ConfigInput,
    ) -> Result<(), EntryError> {
        if !self.entries.contains_key(entry_id) {
            error!(entry_id, "Reconfigure failed, config entry not found");
            return Err(EntryError::NotFound(entry_id.to_string()));
        }

        let config = self.check(input).await?;
        info!(entry_id, name = %config.name, "Configuration update detected, reloading entry");
        self.unload(entry_id);
        self.load(entry_id.to_string(), &config);
        Ok(())
    }

    pub fn remove_entry(&mut self, entry_id: &str) -> Result<(), EntryError> {
        if self.unload(entry_id) {
            Ok(())
        } else {
            Err(EntryError::NotFound(entry_id.to_string()))
        }
    }

    pub fn entity(&self, entry_id: &str) -> Option<Arc<GroqWhisperStt>> {
        self.entries.get(entry_id).cloned()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<GroqWhisperStt>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Snapshot suitable for stt_entries.json.
    pub fn stored_entries(&self) -> StoredEntries {
        let mut entries: Vec<StoredEntry> = self
            .entries
            .iter()
            .map(|(entry_id, entity)| StoredEntry {
                entry_id: entry_id.clone(),
                config: ConfigInput::from(entity.config()),
            })
            .collect();
        entries.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
        StoredEntries { entries }
    }
}
