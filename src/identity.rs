//! Identity context.
//!
//! The engine does not implement login; it consumes a bearer identity
//! (`{user_id, token}`) issued elsewhere and injected before any sync call.
//! A missing identity is a precondition failure reported as `no_auth` status,
//! never an error to be thrown or silently swallowed.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LocritError, Result};

/// Filename for stored identity under the app config directory.
const IDENTITY_FILENAME: &str = "identity.json";

/// A bearer principal: the owner namespace plus the token presented to the
/// remote backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub token: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

/// Shared holder for the current principal. Injected into the engine;
/// mutated by the presentation layer on login/logout.
#[derive(Debug, Default)]
pub struct IdentityContext {
    inner: RwLock<Option<Identity>>,
}

impl IdentityContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_identity(identity: Identity) -> Self {
        Self {
            inner: RwLock::new(Some(identity)),
        }
    }

    pub fn set(&self, identity: Identity) {
        debug!(user_id = %identity.user_id, "identity set");
        *self.inner.write() = Some(identity);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.inner.read().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.read().is_some()
    }

    /// A display-safe hint of who is logged in (the user id; the token is
    /// never exposed here).
    #[must_use]
    pub fn principal_hint(&self) -> Option<String> {
        self.inner.read().as_ref().map(|id| id.user_id.clone())
    }
}

/// Path of the identity file under the given config directory.
#[must_use]
pub fn identity_path(config_dir: &Path) -> PathBuf {
    config_dir.join(IDENTITY_FILENAME)
}

/// Persist the identity for later sessions. JSON, plain file; token issuance
/// and refresh live outside this crate.
pub fn save_identity(config_dir: &Path, identity: &Identity) -> Result<()> {
    std::fs::create_dir_all(config_dir).map_err(|err| {
        LocritError::Config(format!("create config dir {}: {err}", config_dir.display()))
    })?;
    let path = identity_path(config_dir);
    let rendered = serde_json::to_string_pretty(identity)?;
    std::fs::write(&path, rendered)
        .map_err(|err| LocritError::Config(format!("write {}: {err}", path.display())))?;
    debug!(path = %path.display(), "identity saved");
    Ok(())
}

/// Load a previously saved identity. A missing or unreadable file is `None`,
/// not an error; the caller sees it as "not logged in".
#[must_use]
pub fn load_identity(config_dir: &Path) -> Option<Identity> {
    let path = identity_path(config_dir);
    let contents = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(identity) => Some(identity),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring malformed identity file");
            None
        }
    }
}

/// Remove the saved identity. Returns whether a file was removed.
pub fn clear_identity(config_dir: &Path) -> bool {
    std::fs::remove_file(identity_path(config_dir)).is_ok()
}
