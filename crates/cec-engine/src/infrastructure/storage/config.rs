//! TOML-based configuration persistence for the engine.
//!
//! Reads and writes `EngineConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\CecEngine\config.toml`
//! - Linux:    `~/.config/cec-engine/config.toml`
//! - macOS:    `~/Library/Application Support/CecEngine/config.toml`
//!
//! Fields absent from the file fall back to `#[serde(default = ...)]`
//! values, so a missing or partial config is never an error: first runs and
//! upgrades from older files both load cleanly.
//!
//! The `[audio]` section doubles as the restart-continuity store for the
//! negotiated audio capability.  The flattened value is applied verbatim on
//! the next start; it is never re-validated against the bus.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::discovery::PollOrder;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level engine configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub audio: AudioSection,
}

/// General engine behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSection {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Address-range poll order: `"descending"` (default) or `"ascending"`.
    #[serde(default = "default_poll_order")]
    pub poll_order: String,
    /// Per-stage reply timeout during discovery, in milliseconds.
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
}

/// Persisted audio negotiation state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioSection {
    /// Flattened negotiated capability from the last run, one
    /// `code:supported:channels:rate_mask:bitrate` record per candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiated_capability: Option<String>,
}

impl EngineSection {
    /// The configured poll order; unknown values fall back to the default.
    pub fn parsed_poll_order(&self) -> PollOrder {
        match self.poll_order.as_str() {
            "ascending" => PollOrder::Ascending,
            _ => PollOrder::Descending,
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_poll_order() -> String {
    "descending".to_string()
}
fn default_stage_timeout_ms() -> u64 {
    2000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineSection::default(),
            audio: AudioSection::default(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            poll_order: default_poll_order(),
            stage_timeout_ms: default_stage_timeout_ms(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `EngineConfig` from `path`, returning `EngineConfig::default()` if
/// the file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<EngineConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: EngineConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EngineConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Loads `EngineConfig` from the platform config file.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &EngineConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Persists `config` to the platform config file.
pub fn save_config(config: &EngineConfig) -> Result<(), ConfigError> {
    save_config_to(&config_file_path()?, config)
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("CecEngine"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("cec-engine"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("CecEngine")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
