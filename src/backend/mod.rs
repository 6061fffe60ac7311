//! Remote backend adapter.
//!
//! Two incompatible remote storage shapes sit behind one contract: the
//! [`document`] backend (collection/document semantics with equality
//! queries) and the [`tree`] backend (path-addressed read/write/delete on a
//! hierarchical store). Backends are stateless gateways; the local store
//! owns the data during a sync pass.
//!
//! Timestamps on the wire are typed objects — `{"$timestamp": "<RFC3339>"}`
//! for an explicit instant, `{"$serverTimestamp": true}` for the
//! server-assigned sentinel. The document backend passes them through
//! untouched; the tree backend cannot store rich timestamp objects and
//! flattens every one of them to a plain ISO-8601 string (recursively
//! through nested maps and lists) before writing. The asymmetry is a
//! deliberate part of the contract.

pub mod document;
mod http;
pub mod tree;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::BackendSettings;
use crate::error::{LocritError, Result};

pub use document::DocumentBackend;
pub use tree::TreeBackend;

/// Which remote shape is behind the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Document,
    Tree,
    /// No backend could be initialized; every operation short-circuits.
    None,
}

impl BackendKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Tree => "tree",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamp bound for the remote side: either assigned by the server at
/// write time or an explicit instant carried from the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTimestamp {
    ServerAssigned,
    Explicit(DateTime<Utc>),
}

impl RemoteTimestamp {
    /// Typed wire form. Serialization branches exhaustively; there is no
    /// magic-string fallback.
    #[must_use]
    pub fn to_wire(self) -> Value {
        match self {
            Self::ServerAssigned => json!({ "$serverTimestamp": true }),
            Self::Explicit(instant) => json!({ "$timestamp": instant.to_rfc3339() }),
        }
    }

    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Option<Self> {
        raw.and_then(crate::record::parse_timestamp)
            .map(Self::Explicit)
    }
}

/// Outcome of an upsert. `created` is reliable for the document backend
/// (true only when no prior document matched the equality query); the tree
/// backend cannot distinguish create from update without a prior read, so
/// there it is best-effort and callers may use it for logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: String,
    pub created: bool,
}

/// The record shape shipped to a remote store.
#[derive(Debug, Clone)]
pub struct RecordPayload {
    pub name: String,
    pub body: Map<String, Value>,
    pub owner_id: String,
    pub updated_at: RemoteTimestamp,
    pub created_at: RemoteTimestamp,
}

impl RecordPayload {
    /// Wire document: `{name, body, ownerId, updatedAt, createdAt}` with
    /// typed timestamp objects.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        json!({
            "name": self.name,
            "body": Value::Object(self.body.clone()),
            "ownerId": self.owner_id,
            "updatedAt": self.updated_at.to_wire(),
            "createdAt": self.created_at.to_wire(),
        })
    }
}

/// Rewrite every typed timestamp object in `value` to a plain ISO-8601
/// string, recursively through maps and lists. The server-assigned sentinel
/// resolves client-side to `now` — the tree store has no server sentinel.
#[must_use]
pub fn timestamps_to_iso(value: &Value, now: DateTime<Utc>) -> Value {
    if let Some(text) = wire_timestamp(value, now) {
        return Value::String(text);
    }
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| (key.clone(), timestamps_to_iso(inner, now)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items.iter().map(|inner| timestamps_to_iso(inner, now)).collect(),
        ),
        other => other.clone(),
    }
}

fn wire_timestamp(value: &Value, now: DateTime<Utc>) -> Option<String> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    if let Some(raw) = map.get("$timestamp").and_then(Value::as_str) {
        return Some(raw.to_string());
    }
    if map.get("$serverTimestamp").and_then(Value::as_bool) == Some(true) {
        return Some(now.to_rfc3339());
    }
    None
}

/// Single capability contract over both remote shapes.
pub trait RemoteBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether the backend was initialized and is believed reachable. When
    /// false, every operation returns [`LocritError::BackendUnavailable`]
    /// instead of panicking, so the orchestrator can still produce a
    /// well-formed report.
    fn is_available(&self) -> bool;

    /// Install the bearer token presented on subsequent calls. The engine
    /// injects the current identity's token before each pass.
    fn set_auth_token(&self, token: Option<&str>);

    /// Create or replace a record under the owner scope.
    fn upsert(&self, scope: &str, record_id: &str, payload: &RecordPayload)
        -> Result<UpsertOutcome>;

    /// All records under the owner scope, keyed by record id, with wire
    /// timestamps already decoded to plain ISO-8601 strings.
    fn fetch_all(&self, scope: &str) -> Result<BTreeMap<String, Map<String, Value>>>;

    /// Merge a partial field map into an existing record. Returns whether a
    /// record was there to update.
    fn update_fields(&self, scope: &str, record_id: &str, partial: &Map<String, Value>)
        -> Result<bool>;

    /// Append an entry to the owner's sync log.
    fn append_log(&self, scope: &str, entry: &Value) -> Result<bool>;

    /// Delete a record. Returns whether it existed.
    fn remove(&self, scope: &str, record_id: &str) -> Result<bool>;
}

/// Null object used when no backend could be initialized.
#[derive(Debug, Default)]
pub struct UnavailableBackend;

impl RemoteBackend for UnavailableBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::None
    }

    fn is_available(&self) -> bool {
        false
    }

    fn set_auth_token(&self, _token: Option<&str>) {}

    fn upsert(
        &self,
        _scope: &str,
        _record_id: &str,
        _payload: &RecordPayload,
    ) -> Result<UpsertOutcome> {
        Err(LocritError::BackendUnavailable)
    }

    fn fetch_all(&self, _scope: &str) -> Result<BTreeMap<String, Map<String, Value>>> {
        Err(LocritError::BackendUnavailable)
    }

    fn update_fields(
        &self,
        _scope: &str,
        _record_id: &str,
        _partial: &Map<String, Value>,
    ) -> Result<bool> {
        Err(LocritError::BackendUnavailable)
    }

    fn append_log(&self, _scope: &str, _entry: &Value) -> Result<bool> {
        Err(LocritError::BackendUnavailable)
    }

    fn remove(&self, _scope: &str, _record_id: &str) -> Result<bool> {
        Err(LocritError::BackendUnavailable)
    }
}

/// Shared bearer-token slot for the HTTP backends.
#[derive(Debug, Default)]
pub(crate) struct AuthSlot {
    token: RwLock<Option<String>>,
}

impl AuthSlot {
    pub(crate) fn set(&self, token: Option<&str>) {
        *self.token.write() = token.map(String::from);
    }

    pub(crate) fn bearer(&self) -> Option<String> {
        self.token.read().clone()
    }
}

/// Select a backend: document first, tree as fallback, unavailable marker
/// when neither can be reached. Never fails — connectivity problems surface
/// later as `backend_unavailable` status, not as startup errors.
pub fn connect(settings: &BackendSettings, timeout: Duration) -> Arc<dyn RemoteBackend> {
    if let Some(url) = settings.document_url.as_deref() {
        match DocumentBackend::connect(url, timeout) {
            Ok(backend) => {
                info!(url = %url, "document backend selected");
                return Arc::new(backend);
            }
            Err(err) => {
                warn!(url = %url, error = %err, "document backend unavailable, trying tree");
            }
        }
    }
    if let Some(url) = settings.tree_url.as_deref() {
        match TreeBackend::connect(url, timeout) {
            Ok(backend) => {
                info!(url = %url, "tree backend selected");
                return Arc::new(backend);
            }
            Err(err) => {
                warn!(url = %url, error = %err, "tree backend unavailable");
            }
        }
    }
    warn!("no remote backend available; sync passes will report backend_unavailable");
    Arc::new(UnavailableBackend)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explicit(raw: &str) -> RemoteTimestamp {
        RemoteTimestamp::from_raw(Some(raw)).unwrap()
    }

    #[test]
    fn explicit_timestamp_wire_form() {
        let wire = explicit("2024-01-01T00:00:00Z").to_wire();
        assert_eq!(wire, json!({ "$timestamp": "2024-01-01T00:00:00+00:00" }));
    }

    #[test]
    fn server_sentinel_wire_form() {
        assert_eq!(
            RemoteTimestamp::ServerAssigned.to_wire(),
            json!({ "$serverTimestamp": true })
        );
    }

    #[test]
    fn payload_wire_shape() {
        let mut body = Map::new();
        body.insert("description".to_string(), json!("trail guide"));
        let payload = RecordPayload {
            name: "gruffle".to_string(),
            body,
            owner_id: "user-1".to_string(),
            updated_at: explicit("2024-02-01T00:00:00Z"),
            created_at: explicit("2024-01-01T00:00:00Z"),
        };
        let wire = payload.to_wire();
        assert_eq!(wire["name"], "gruffle");
        assert_eq!(wire["ownerId"], "user-1");
        assert_eq!(wire["body"]["description"], "trail guide");
        assert!(wire["updatedAt"].get("$timestamp").is_some());
    }

    #[test]
    fn flattening_rewrites_nested_timestamps() {
        let now = Utc::now();
        let wire = json!({
            "updatedAt": { "$timestamp": "2024-02-01T00:00:00+00:00" },
            "body": {
                "history": [
                    { "at": { "$timestamp": "2024-01-15T00:00:00+00:00" } },
                ],
            },
        });
        let flat = timestamps_to_iso(&wire, now);
        assert_eq!(flat["updatedAt"], "2024-02-01T00:00:00+00:00");
        assert_eq!(flat["body"]["history"][0]["at"], "2024-01-15T00:00:00+00:00");
    }

    #[test]
    fn flattening_resolves_server_sentinel_to_now() {
        let now = Utc::now();
        let flat = timestamps_to_iso(&json!({ "createdAt": { "$serverTimestamp": true } }), now);
        assert_eq!(flat["createdAt"], now.to_rfc3339());
    }

    #[test]
    fn flattening_leaves_ordinary_maps_alone() {
        let now = Utc::now();
        let value = json!({ "access": { "public": false }, "tags": ["a", "b"] });
        assert_eq!(timestamps_to_iso(&value, now), value);
    }

    #[test]
    fn lookalike_map_with_extra_keys_is_not_a_timestamp() {
        let now = Utc::now();
        let value = json!({ "$timestamp": "2024-01-01T00:00:00Z", "other": 1 });
        assert_eq!(timestamps_to_iso(&value, now)["other"], 1);
    }

    #[test]
    fn unavailable_backend_short_circuits() {
        let backend = UnavailableBackend;
        assert_eq!(backend.kind(), BackendKind::None);
        assert!(!backend.is_available());
        assert!(matches!(
            backend.fetch_all("user-1"),
            Err(LocritError::BackendUnavailable)
        ));
    }

    #[test]
    fn connect_with_no_urls_yields_unavailable() {
        let backend = connect(&BackendSettings::default(), Duration::from_secs(1));
        assert_eq!(backend.kind(), BackendKind::None);
        assert!(!backend.is_available());
    }

    #[test]
    fn backend_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&BackendKind::Document).unwrap(), "\"document\"");
        assert_eq!(serde_json::to_string(&BackendKind::None).unwrap(), "\"none\"");
    }
}
