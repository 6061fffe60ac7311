//! Status projection and local-store snapshots.
//!
//! Snapshots are a recovery safety net independent of sync: a point-in-time
//! YAML export of the whole settings tree, rotated so only the N most recent
//! per category survive. The conflict resolver never consults them.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::BackendKind;
use crate::error::{LocritError, Result};
use crate::store::SettingsStore;

/// Read-only projection of the engine's health, safe to poll for a UI
/// indicator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub backend_initialized: bool,
    pub backend_kind: BackendKind,
    pub authenticated: bool,
    pub principal_hint: Option<String>,
}

/// On-disk shape of one snapshot file.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    category: String,
    created_at: String,
    record_count: usize,
    settings: serde_json::Value,
}

/// Listing entry for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub created_at: String,
    pub record_count: usize,
}

fn validate_category(category: &str) -> Result<()> {
    let ok = !category.is_empty()
        && category
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(LocritError::Config(format!(
            "invalid snapshot category: {category}"
        )))
    }
}

fn snapshot_id(category: &str) -> String {
    format!("{category}-{}", Utc::now().format("%Y%m%d-%H%M%S%.3f"))
}

/// Serialize the whole store into `<dir>/<category>-<timestamp>.yaml` and
/// rotate older snapshots of the same category. Returns the snapshot id.
pub fn snapshot_store(
    store: &SettingsStore,
    dir: &Path,
    category: &str,
    keep: usize,
) -> Result<String> {
    validate_category(category)?;
    std::fs::create_dir_all(dir)
        .map_err(|err| LocritError::Config(format!("create backup dir {}: {err}", dir.display())))?;

    let id = snapshot_id(category);
    let document = SnapshotDocument {
        category: category.to_string(),
        created_at: Utc::now().to_rfc3339(),
        record_count: store.record_count(),
        settings: store.tree().clone(),
    };
    let path = dir.join(format!("{id}.yaml"));
    let rendered = serde_yaml::to_string(&document)?;
    std::fs::write(&path, rendered)
        .map_err(|err| LocritError::Config(format!("write snapshot {}: {err}", path.display())))?;
    debug!(id = %id, records = document.record_count, "snapshot written");

    rotate(dir, category, keep);
    Ok(id)
}

/// Keep only the `keep` most recent snapshots of `category`, by modification
/// time. Rotation failures are logged, never fatal — the new snapshot is
/// already on disk.
fn rotate(dir: &Path, category: &str, keep: usize) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let prefix = format!("{category}-");
    let mut snapshots: Vec<(PathBuf, std::time::SystemTime)> = entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            let name = path.file_name()?.to_str()?;
            if !name.starts_with(&prefix) || !name.ends_with(".yaml") {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((path, modified))
        })
        .collect();

    snapshots.sort_by(|a, b| b.1.cmp(&a.1));
    for (path, _) in snapshots.into_iter().skip(keep.max(1)) {
        if let Err(err) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %err, "snapshot rotation failed");
        } else {
            debug!(path = %path.display(), "old snapshot rotated out");
        }
    }
}

/// Snapshots of a category, newest first.
pub fn list_snapshots(dir: &Path, category: &str) -> Result<Vec<SnapshotInfo>> {
    validate_category(category)?;
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let prefix = format!("{category}-");
    let mut infos = Vec::new();
    for entry in std::fs::read_dir(dir)
        .map_err(|err| LocritError::Config(format!("read backup dir {}: {err}", dir.display())))?
    {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(&prefix) || !name.ends_with(".yaml") {
            continue;
        }
        let id = name.trim_end_matches(".yaml").to_string();
        match std::fs::read_to_string(&path)
            .map_err(LocritError::from)
            .and_then(|contents| Ok(serde_yaml::from_str::<SnapshotDocument>(&contents)?))
        {
            Ok(document) => infos.push(SnapshotInfo {
                id,
                created_at: document.created_at,
                record_count: document.record_count,
            }),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable snapshot skipped");
            }
        }
    }
    infos.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(infos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use serde_json::{json, Map};
    use tempfile::TempDir;

    fn store_with_records(temp: &TempDir, count: usize) -> SettingsStore {
        let mut store = SettingsStore::open(temp.path().join("settings.yaml")).unwrap();
        for i in 0..count {
            store.set_record(Record::new(format!("rec-{i}"), Map::new()));
        }
        store.set("network.host", json!("localhost"));
        store
    }

    #[test]
    fn snapshot_writes_tree_and_count() {
        let temp = TempDir::new().unwrap();
        let store = store_with_records(&temp, 2);
        let dir = temp.path().join("backups");

        let id = snapshot_store(&store, &dir, "records", 5).unwrap();
        assert!(id.starts_with("records-"));

        let contents = std::fs::read_to_string(dir.join(format!("{id}.yaml"))).unwrap();
        let document: SnapshotDocument = serde_yaml::from_str(&contents).unwrap();
        assert_eq!(document.record_count, 2);
        assert_eq!(document.settings["network"]["host"], "localhost");
    }

    #[test]
    fn rotation_keeps_only_n_most_recent() {
        let temp = TempDir::new().unwrap();
        let store = store_with_records(&temp, 1);
        let dir = temp.path().join("backups");

        for _ in 0..5 {
            snapshot_store(&store, &dir, "records", 2).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let remaining = list_snapshots(&dir, "records").unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn rotation_is_per_category() {
        let temp = TempDir::new().unwrap();
        let store = store_with_records(&temp, 1);
        let dir = temp.path().join("backups");

        snapshot_store(&store, &dir, "records", 1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        snapshot_store(&store, &dir, "settings", 1).unwrap();

        assert_eq!(list_snapshots(&dir, "records").unwrap().len(), 1);
        assert_eq!(list_snapshots(&dir, "settings").unwrap().len(), 1);
    }

    #[test]
    fn list_is_newest_first() {
        let temp = TempDir::new().unwrap();
        let store = store_with_records(&temp, 1);
        let dir = temp.path().join("backups");

        let first = snapshot_store(&store, &dir, "records", 5).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = snapshot_store(&store, &dir, "records", 5).unwrap();

        let infos = list_snapshots(&dir, "records").unwrap();
        assert_eq!(infos[0].id, second);
        assert_eq!(infos[1].id, first);
    }

    #[test]
    fn invalid_category_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = store_with_records(&temp, 0);
        let err = snapshot_store(&store, temp.path(), "../escape", 5);
        assert!(err.is_err());
    }

    #[test]
    fn missing_dir_lists_empty() {
        let temp = TempDir::new().unwrap();
        let infos = list_snapshots(&temp.path().join("nope"), "records").unwrap();
        assert!(infos.is_empty());
    }
}
