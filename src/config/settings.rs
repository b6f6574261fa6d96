//! Application settings and configuration types.
//!
//! Settings are persisted to `settings.json` in the platform config directory
//! (e.g. `~/.config/postbox/settings.json`) and loaded at startup. Missing
//! files and missing fields fall back to defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::NotificationSettings as ToastSettings;

/// Errors loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no config directory available on this platform")]
    NoConfigDir,
}

/// Top-level application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database location.
    pub storage: StorageSettings,
    /// Log filter.
    pub logging: LoggingSettings,
    /// View cache sizing.
    pub cache: CacheSettings,
    /// Toast preferences.
    pub notifications: NotificationSettings,
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Loads settings from `path`, or defaults if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file; using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes settings as pretty JSON, creating the parent directory.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Database file to open: the configured one, else the platform data
    /// directory.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.storage.database_path {
            return Ok(path.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().join("postbox.db"))
            .ok_or(ConfigError::NoConfigDir)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "postbox", "postbox")
}

/// Database location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Overrides the platform data directory.
    pub database_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directives. `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "postbox=info".to_string(),
        }
    }
}

/// View cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of cached query results.
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

/// Notification preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Master switch for toasts.
    pub enabled: bool,
    /// Toasts kept on screen at once.
    pub max_visible: usize,
    /// Seconds before success and info toasts disappear.
    pub success_dismiss_secs: Option<u64>,
    /// Seconds before warning and error toasts disappear.
    pub error_dismiss_secs: Option<u64>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_visible: 5,
            success_dismiss_secs: None,
            error_dismiss_secs: None,
        }
    }
}

impl From<&NotificationSettings> for ToastSettings {
    fn from(settings: &NotificationSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_visible: settings.max_visible,
            success_dismiss: settings.success_dismiss_secs.map(Duration::from_secs),
            error_dismiss: settings.error_dismiss_secs.map(Duration::from_secs),
        }
    }
}
