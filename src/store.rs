//! Local record store.
//!
//! One YAML document backs both the synchronized records and arbitrary
//! nested settings (network config, feature flags). Values are addressed by
//! dotted paths (`"locrits.instances.gruffle"`); records live under the
//! [`RECORDS_NS`] namespace and sibling namespaces are never touched by the
//! sync engine.
//!
//! Persistence replaces the backing file atomically: the full tree is
//! serialized to a temp file in the same directory and renamed over the
//! target, so a partial write can never corrupt the store.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{LocritError, Result};
use crate::record::Record;

/// Dotted-path namespace holding the synchronized records, keyed by name.
pub const RECORDS_NS: &str = "locrits.instances";

/// Durable key/value settings tree with dotted-path addressing.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    root: Value,
}

impl SettingsStore {
    /// Open the store at `path`, loading the file if it exists and starting
    /// from an empty tree otherwise.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let root = Self::load_root(&path)?;
        Ok(Self { path, root })
    }

    /// Discard in-memory state and re-read the backing file.
    pub fn reload(&mut self) -> Result<()> {
        self.root = Self::load_root(&self.path)?;
        Ok(())
    }

    fn load_root(path: &Path) -> Result<Value> {
        if !path.exists() {
            return Ok(Value::Object(Map::new()));
        }
        let contents = std::fs::read_to_string(path).map_err(|err| {
            LocritError::Config(format!("read store {}: {err}", path.display()))
        })?;
        if contents.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        let root: Value = serde_yaml::from_str(&contents)?;
        if root.is_object() {
            Ok(root)
        } else {
            Err(LocritError::Config(format!(
                "store {} is not a mapping at the top level",
                path.display()
            )))
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a dotted path. Returns `None` when any segment is missing.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.root;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Look up a dotted path, falling back to a caller-supplied default.
    #[must_use]
    pub fn get_or<'a>(&'a self, path: &str, default: &'a Value) -> &'a Value {
        self.get(path).unwrap_or(default)
    }

    /// Write a value at a dotted path, creating intermediate maps on demand.
    /// A non-map intermediate is replaced by a map.
    pub fn set(&mut self, path: &str, value: Value) {
        let mut current = &mut self.root;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                if let Some(map) = current.as_object_mut() {
                    map.insert(segment.to_string(), value);
                }
                return;
            }
            let map = current
                .as_object_mut()
                .expect("intermediate store nodes are maps");
            let entry = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = entry;
        }
    }

    /// Remove the value at a dotted path. Returns whether anything was
    /// removed.
    pub fn remove(&mut self, path: &str) -> bool {
        let Some((parent_path, key)) = path.rsplit_once('.') else {
            return self
                .root
                .as_object_mut()
                .and_then(|map| map.remove(path))
                .is_some();
        };
        let Some(parent) = self.get_mut(parent_path) else {
            return false;
        };
        parent
            .as_object_mut()
            .and_then(|map| map.remove(key))
            .is_some()
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut current = &mut self.root;
        for segment in path.split('.') {
            current = current.as_object_mut()?.get_mut(segment)?;
        }
        Some(current)
    }

    /// Serialize the full tree to the backing file, atomically. Failure is
    /// reported to the caller; retries belong above this layer.
    pub fn persist(&self) -> Result<()> {
        let rendered = serde_yaml::to_string(&self.root)?;
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        std::fs::create_dir_all(&parent).map_err(|err| {
            LocritError::Config(format!("create store dir {}: {err}", parent.display()))
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        std::io::Write::write_all(&mut tmp, rendered.as_bytes())?;
        tmp.persist(&self.path)
            .map_err(|err| LocritError::Io(err.error))?;
        debug!(path = %self.path.display(), "store persisted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Record accessors. Record names may themselves contain dots, so these
    // index the namespace map directly instead of going through the dotted
    // path parser.
    // ------------------------------------------------------------------

    fn records(&self) -> Option<&Map<String, Value>> {
        self.get(RECORDS_NS).and_then(Value::as_object)
    }

    fn records_mut(&mut self) -> &mut Map<String, Value> {
        if self.get(RECORDS_NS).map_or(true, |v| !v.is_object()) {
            self.set(RECORDS_NS, Value::Object(Map::new()));
        }
        self.get_mut(RECORDS_NS)
            .and_then(Value::as_object_mut)
            .expect("records namespace is a map")
    }

    /// Names of all local records, sorted.
    #[must_use]
    pub fn list_records(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    #[must_use]
    pub fn record(&self, name: &str) -> Option<Record> {
        self.records()
            .and_then(|map| map.get(name))
            .and_then(|value| Record::from_value(name, value))
    }

    /// Upsert a record, stamping `updatedAt` when the caller has not set one
    /// and preserving the original `createdAt` (set once at first write).
    pub fn set_record(&mut self, mut record: Record) {
        let now = Utc::now();
        if record.updated_at_raw().is_none() {
            record.set_updated_at(now);
        }
        if record.created_at_raw().is_none() {
            match self.record(record.name()).and_then(|r| r.created_at()) {
                Some(existing) => record.set_created_at(existing),
                None => record.set_created_at(now),
            }
        }
        self.put_record_verbatim(record);
    }

    /// Write a record exactly as given, with no stamping. Used by the sync
    /// engine when mirroring remote state.
    pub fn put_record_verbatim(&mut self, record: Record) {
        let name = record.name().to_string();
        self.records_mut()
            .insert(name, Value::Object(record.into_fields()));
    }

    /// Delete a record. Returns whether it existed.
    pub fn delete_record(&mut self, name: &str) -> bool {
        self.records_mut().remove(name).is_some()
    }

    /// Count of records currently in the store.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records().map_or(0, Map::len)
    }

    /// The full settings tree, for snapshotting.
    #[must_use]
    pub fn tree(&self) -> &Value {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, SettingsStore) {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::open(temp.path().join("settings.yaml")).unwrap();
        (temp, store)
    }

    #[test]
    fn dotted_set_creates_intermediates() {
        let (_temp, mut store) = open_temp();
        store.set("network.server.port", json!(8420));
        assert_eq!(store.get("network.server.port"), Some(&json!(8420)));
        assert!(store.get("network.server").unwrap().is_object());
    }

    #[test]
    fn get_missing_segment_returns_default() {
        let (_temp, store) = open_temp();
        let default = json!("fallback");
        assert_eq!(store.get("no.such.path"), None);
        assert_eq!(store.get_or("no.such.path", &default), &default);
    }

    #[test]
    fn set_overwrites_non_map_intermediate() {
        let (_temp, mut store) = open_temp();
        store.set("features.chat", json!(true));
        store.set("features.chat.streaming", json!(false));
        assert_eq!(store.get("features.chat.streaming"), Some(&json!(false)));
    }

    #[test]
    fn remove_reports_presence() {
        let (_temp, mut store) = open_temp();
        store.set("features.chat", json!(true));
        assert!(store.remove("features.chat"));
        assert!(!store.remove("features.chat"));
        assert!(!store.remove("never.was.here"));
    }

    #[test]
    fn persist_and_reload_roundtrip() {
        let (_temp, mut store) = open_temp();
        store.set("network.host", json!("localhost"));
        store.set_record(Record::new("gruffle", Map::new()));
        store.persist().unwrap();

        let reopened = SettingsStore::open(store.path()).unwrap();
        assert_eq!(reopened.get("network.host"), Some(&json!("localhost")));
        assert_eq!(reopened.list_records(), vec!["gruffle".to_string()]);
    }

    #[test]
    fn persist_replaces_rather_than_appends() {
        let (_temp, mut store) = open_temp();
        store.set("a", json!(1));
        store.persist().unwrap();
        store.remove("a");
        store.set("b", json!(2));
        store.persist().unwrap();

        let reopened = SettingsStore::open(store.path()).unwrap();
        assert_eq!(reopened.get("a"), None);
        assert_eq!(reopened.get("b"), Some(&json!(2)));
    }

    #[test]
    fn set_record_stamps_updated_at_when_missing() {
        let (_temp, mut store) = open_temp();
        store.set_record(Record::new("gruffle", Map::new()));
        let record = store.record("gruffle").unwrap();
        assert!(record.updated_at().is_some());
        assert!(record.created_at().is_some());
    }

    #[test]
    fn set_record_preserves_caller_updated_at() {
        let (_temp, mut store) = open_temp();
        let fields = json!({ "updatedAt": "2024-01-01T00:00:00Z" });
        store.set_record(Record::from_value("gruffle", &fields).unwrap());
        let record = store.record("gruffle").unwrap();
        assert_eq!(record.updated_at_raw(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn created_at_is_set_once() {
        let (_temp, mut store) = open_temp();
        let first = json!({ "createdAt": "2024-01-01T00:00:00Z" });
        store.set_record(Record::from_value("gruffle", &first).unwrap());

        // Update without createdAt keeps the original.
        store.set_record(Record::new("gruffle", Map::new()));
        let record = store.record("gruffle").unwrap();
        assert_eq!(record.created_at_raw(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn record_names_with_dots_are_single_keys() {
        let (_temp, mut store) = open_temp();
        store.set_record(Record::new("v2.beta", Map::new()));
        assert_eq!(store.list_records(), vec!["v2.beta".to_string()]);
        assert!(store.record("v2.beta").is_some());
        assert!(store.delete_record("v2.beta"));
    }

    #[test]
    fn delete_record_reports_presence() {
        let (_temp, mut store) = open_temp();
        store.set_record(Record::new("gruffle", Map::new()));
        assert!(store.delete_record("gruffle"));
        assert!(!store.delete_record("gruffle"));
    }

    #[test]
    fn sibling_namespaces_survive_record_writes() {
        let (_temp, mut store) = open_temp();
        store.set("network.host", json!("localhost"));
        store.set_record(Record::new("gruffle", Map::new()));
        store.delete_record("gruffle");
        assert_eq!(store.get("network.host"), Some(&json!("localhost")));
    }

    #[test]
    fn reload_discards_unpersisted_changes() {
        let (_temp, mut store) = open_temp();
        store.set("a", json!(1));
        store.persist().unwrap();
        store.set("a", json!(99));
        store.reload().unwrap();
        assert_eq!(store.get("a"), Some(&json!(1)));
    }
}
