//! Error handling for locrit-sync.
//!
//! Recoverable sync conditions (disabled, no auth, backend down, per-record
//! failures) are reported as data in [`crate::engine::SyncReport`], never as
//! errors crossing the public `run_sync` boundary. [`LocritError`] covers
//! everything else: I/O, serialization, configuration, and backend transport.

use std::io;

use thiserror::Error;

/// Main error type for locrit-sync operations.
#[derive(Error, Debug)]
pub enum LocritError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("Not authenticated: {0}")]
    Auth(String),

    #[error("{kind} backend error: {message}")]
    Backend { kind: &'static str, message: String },

    #[error("no remote backend available")]
    BackendUnavailable,

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Malformed remote record: {0}")]
    MalformedRecord(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl LocritError {
    /// Shorthand for a backend transport error.
    pub fn backend(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            kind,
            message: message.into(),
        }
    }
}

/// Result type alias using LocritError.
pub type Result<T> = std::result::Result<T, LocritError>;
