//! Configuration for locrit-sync.
//!
//! TOML file at `<config_dir>/locrit-sync/config.toml` with `[sync]`,
//! `[backend]`, and `[backup]` sections. Every field has a default so a
//! missing file or empty section is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LocritError, Result};

/// App directory name under the platform config dir.
const APP_DIR: &str = "locrit-sync";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub backup: BackupSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Master switch; when false every sync pass reports `disabled`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-call timeout for remote operations.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_enabled() -> bool {
    true
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendSettings {
    /// Document (collection/query) store endpoint. Attempted first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    /// Tree (path-addressed) store endpoint. Fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Snapshots kept per category; older ones are rotated out by mtime.
    #[serde(default = "default_backup_keep")]
    pub keep: usize,
    /// Snapshot directory; defaults to `<config_dir>/locrit-sync/backups`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

const fn default_backup_keep() -> usize {
    5
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            keep: default_backup_keep(),
            dir: None,
        }
    }
}

impl Config {
    /// Platform config directory for this app.
    pub fn config_dir() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| LocritError::MissingConfig("config directory not found".to_string()))?;
        Ok(base.join(APP_DIR))
    }

    pub fn path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|err| LocritError::Config(format!("read config {}: {err}", path.display())))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|err| LocritError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| LocritError::Config(format!("create config dir: {err}")))?;
        }
        let rendered = toml::to_string_pretty(self)
            .map_err(|err| LocritError::Config(format!("render config: {err}")))?;
        std::fs::write(path, rendered)
            .map_err(|err| LocritError::Config(format!("write config {}: {err}", path.display())))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("LOCRIT_SYNC_DISABLED") {
            if matches!(value.as_str(), "1" | "true" | "yes") {
                self.sync.enabled = false;
            }
        }
        if let Ok(url) = std::env::var("LOCRIT_SYNC_DOCUMENT_URL") {
            if !url.is_empty() {
                self.backend.document_url = Some(url);
            }
        }
        if let Ok(url) = std::env::var("LOCRIT_SYNC_TREE_URL") {
            if !url.is_empty() {
                self.backend.tree_url = Some(url);
            }
        }
    }

    /// Default location of the local record store.
    pub fn default_store_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.yaml"))
    }

    /// Effective backup directory.
    pub fn backup_dir(&self) -> Result<PathBuf> {
        match &self.backup.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join("backups")),
        }
    }
}
