//! Storage infrastructure: configuration file persistence and the
//! capability-store adapters built on top of it.
//!
//! The `config` sub-module handles:
//!
//! - Reading the TOML configuration file from the platform-appropriate directory.
//! - Writing the negotiated audio capability back for restart continuity.
//! - Providing sensible defaults when the file does not exist yet (first run).

pub mod config;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::application::action::{CapabilityStore, StoreError};

use config::{load_config_from, save_config_to};

/// [`CapabilityStore`] backed by the TOML config file: each persist rewrites
/// the `[audio]` section in place.
pub struct TomlCapabilityStore {
    path: PathBuf,
}

impl TomlCapabilityStore {
    pub fn new(path: PathBuf) -> Self {
        TomlCapabilityStore { path }
    }

    /// Opens the store at the platform config file path.
    pub fn at_platform_path() -> Result<Self, config::ConfigError> {
        Ok(TomlCapabilityStore::new(config::config_file_path()?))
    }

    /// The capability persisted by the last run, if any.
    pub fn stored_capability(&self) -> Result<Option<String>, config::ConfigError> {
        Ok(load_config_from(&self.path)?.audio.negotiated_capability)
    }
}

impl CapabilityStore for TomlCapabilityStore {
    fn persist_audio_capability(&mut self, flattened: &str) -> Result<(), StoreError> {
        let mut cfg =
            load_config_from(&self.path).map_err(|e| StoreError::Persist(e.to_string()))?;
        cfg.audio.negotiated_capability = Some(flattened.to_string());
        save_config_to(&self.path, &cfg).map_err(|e| StoreError::Persist(e.to_string()))
    }
}

/// In-memory [`CapabilityStore`] for tests: clones share the stored value.
#[derive(Clone, Default)]
pub struct MemoryCapabilityStore {
    value: Arc<Mutex<Option<String>>>,
}

impl MemoryCapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last value persisted, if any.
    pub fn last_persisted(&self) -> Option<String> {
        self.value.lock().expect("lock poisoned").clone()
    }
}

impl CapabilityStore for MemoryCapabilityStore {
    fn persist_audio_capability(&mut self, flattened: &str) -> Result<(), StoreError> {
        *self.value.lock().expect("lock poisoned") = Some(flattened.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_shares_value_across_clones() {
        let store = MemoryCapabilityStore::new();
        let mut handle = store.clone();
        handle
            .persist_audio_capability("1:1:2:7:1")
            .expect("persist");
        assert_eq!(store.last_persisted().as_deref(), Some("1:1:2:7:1"));
    }

    #[test]
    fn test_toml_store_round_trips_through_the_config_file() {
        let dir = std::env::temp_dir().join(format!("cec_store_{}", std::process::id()));
        let path = dir.join("config.toml");
        let mut store = TomlCapabilityStore::new(path);

        store
            .persist_audio_capability("1:1:2:7:1;2:0:0:0:0")
            .expect("persist");
        assert_eq!(
            store.stored_capability().expect("load").as_deref(),
            Some("1:1:2:7:1;2:0:0:0:0")
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}
