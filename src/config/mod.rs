//! Configuration module for the ML PID tasks
//!
//! This module handles task configuration including:
//! - Pipe endpoints and wire framing for the classifier channel
//! - Event and track selection thresholds
//! - Training-data dump output
//!
//! # Config Location
//!
//! When no explicit path is given, the configuration is read from the
//! platform-appropriate data directory under `dev.hxyulin.mlpid`:
//! - **Linux**: `~/.local/share/dev.hxyulin.mlpid/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.mlpid/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.mlpid\`
//!
//! # Formats
//!
//! Files ending in `.toml` are parsed as TOML; anything else as JSON.
//! [`TaskConfig::save`] always writes pretty-printed JSON.
//!
//! # Example
//!
//! ```ignore
//! use mlpid::config::TaskConfig;
//!
//! let config = TaskConfig::load("mlpid.toml")?;
//! config.validate()?;
//! println!("request pipe: {:?}", config.pipes.request_path);
//! ```

pub mod settings;

pub use settings::*;

use crate::codec::Framing;
use crate::error::{MlPidError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.mlpid";

/// Config filename inside the app data directory
pub const CONFIG_FILE: &str = "config.json";

/// Default path of the task → classifier pipe
pub const DEFAULT_REQUEST_PIPE: &str = "MLPIDTrackPipe";

/// Default path of the classifier → task pipe
pub const DEFAULT_RESPONSE_PIPE: &str = "MLPIDProbabilityPipe";

/// Default training dump file
pub const DEFAULT_DUMP_FILE: &str = "PreprocessedML.csv";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Pipe Config ====================

/// Classifier channel endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Named pipe the task writes requests to
    pub request_path: PathBuf,

    /// Named pipe the task reads responses from
    pub response_path: PathBuf,

    /// Wire framing, fixed for the whole run
    pub framing: Framing,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            request_path: PathBuf::from(DEFAULT_REQUEST_PIPE),
            response_path: PathBuf::from(DEFAULT_RESPONSE_PIPE),
            framing: Framing::Binary,
        }
    }
}

// ==================== Dump Config ====================

/// Training-data dump settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Output CSV path
    pub output_path: PathBuf,

    /// Input is simulated; truth PDG codes are written when present
    pub is_mc: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_DUMP_FILE),
            is_mc: false,
        }
    }
}

// ==================== Task Config ====================

/// Complete configuration shared by the PID and dump tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskConfig {
    #[serde(default)]
    pub pipes: PipeConfig,

    #[serde(default)]
    pub track_cuts: TrackCuts,

    #[serde(default)]
    pub event_cuts: EventCuts,

    #[serde(default)]
    pub dump: DumpConfig,
}

impl TaskConfig {
    /// Load a config file, choosing the parser by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MlPidError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let config: Self = if is_toml {
            toml::from_str(&content).map_err(|e| {
                MlPidError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                MlPidError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load from the explicit path, else the app data directory, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match default_config_path() {
            Some(default_path) if default_path.exists() => Self::load(default_path),
            _ => {
                tracing::info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Save the config as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MlPidError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MlPidError::Serialization(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| {
            MlPidError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check the configuration is usable for a run
    pub fn validate(&self) -> Result<()> {
        if self.pipes.request_path == self.pipes.response_path {
            return Err(MlPidError::Config(format!(
                "request and response pipes must differ (both {:?})",
                self.pipes.request_path
            )));
        }
        self.track_cuts.validate().map_err(MlPidError::Config)?;
        self.event_cuts.validate().map_err(MlPidError::Config)?;
        Ok(())
    }
}
