//! Sync orchestrator.
//!
//! One sync pass is upload-then-download-then-persist. Every recoverable
//! condition — the feature being disabled, a missing identity, an
//! unreachable backend, any per-record failure, a persist failure — is
//! represented as data in the returned [`SyncReport`]; `run_sync` never
//! returns an error and never lets one record's failure stop the batch.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::backend::{RecordPayload, RemoteBackend, RemoteTimestamp, UpsertOutcome};
use crate::backup::{self, EngineStatus};
use crate::config::Config;
use crate::error::{LocritError, Result};
use crate::identity::{Identity, IdentityContext};
use crate::record::{Record, CREATED_AT, UPDATED_AT};
use crate::resolver::is_remote_newer;
use crate::store::SettingsStore;

/// Terminal status of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Partial,
    NoAuth,
    BackendUnavailable,
    Disabled,
}

/// One failed record (or pass-level step, when `name` is absent).
#[derive(Debug, Clone, Serialize)]
pub struct SyncErrorEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message: String,
}

impl SyncErrorEntry {
    fn record(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.to_string()),
            message: message.into(),
        }
    }

    fn pass(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
        }
    }
}

/// Aggregate outcome of one orchestrator run. JSON-serializable for the
/// presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub status: SyncStatus,
    pub uploaded: Vec<String>,
    pub downloaded_new: Vec<String>,
    pub downloaded_updated: Vec<String>,
    pub local_newer: Vec<String>,
    pub errors: Vec<SyncErrorEntry>,
    pub duration_ms: u128,
}

impl SyncReport {
    fn empty(status: SyncStatus) -> Self {
        Self {
            status,
            uploaded: Vec::new(),
            downloaded_new: Vec::new(),
            downloaded_updated: Vec::new(),
            local_newer: Vec::new(),
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "↑{} +{} ↓{} ={} ⚠{}",
            self.uploaded.len(),
            self.downloaded_new.len(),
            self.downloaded_updated.len(),
            self.local_newer.len(),
            self.errors.len()
        )
    }
}

/// The sync engine. All collaborators are injected; there is no process-wide
/// state, so tests run against doubles.
pub struct SyncEngine {
    config: Config,
    store: Arc<Mutex<SettingsStore>>,
    backend: Arc<dyn RemoteBackend>,
    identity: Arc<IdentityContext>,
}

impl SyncEngine {
    pub fn new(
        config: Config,
        store: Arc<Mutex<SettingsStore>>,
        backend: Arc<dyn RemoteBackend>,
        identity: Arc<IdentityContext>,
    ) -> Self {
        Self {
            config,
            store,
            backend,
            identity,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    #[must_use]
    pub fn store(&self) -> &Arc<Mutex<SettingsStore>> {
        &self.store
    }

    /// Run one sync pass. Preconditions are checked in order and each yields
    /// an immediate terminal report without touching the backend.
    pub fn run_sync(&self) -> SyncReport {
        let start = Instant::now();

        if !self.config.sync.enabled {
            debug!("sync disabled by configuration");
            return finish(SyncReport::empty(SyncStatus::Disabled), start);
        }
        let Some(identity) = self.identity.current() else {
            debug!("sync requested with no identity set");
            return finish(SyncReport::empty(SyncStatus::NoAuth), start);
        };
        if !self.backend.is_available() {
            debug!("sync requested with no backend available");
            return finish(SyncReport::empty(SyncStatus::BackendUnavailable), start);
        }

        self.backend.set_auth_token(Some(&identity.token));
        let mut report = SyncReport::empty(SyncStatus::Success);

        // Upload completes fully before download begins, so a record pushed
        // in this pass is visible to this pass's own download and the pass
        // is idempotent. An error escaping the per-record isolation below is
        // a contract violation: logged distinctly, reported, never thrown.
        if let Err(err) = self.upload_phase(&identity, &mut report) {
            error!(error = %err, "upload phase aborted outside per-record isolation");
            report
                .errors
                .push(SyncErrorEntry::pass(format!("upload phase: {err}")));
        }
        if let Err(err) = self.download_phase(&identity, &mut report) {
            error!(error = %err, "download phase aborted outside per-record isolation");
            report
                .errors
                .push(SyncErrorEntry::pass(format!("download phase: {err}")));
        }

        // One persist per pass. A durability failure downgrades the whole
        // pass even when every record-level operation succeeded.
        if let Err(err) = self.store.lock().persist() {
            warn!(error = %err, "persisting sync results failed");
            report
                .errors
                .push(SyncErrorEntry::pass(format!("persist local store: {err}")));
        }

        report.status = if report.errors.is_empty() {
            SyncStatus::Success
        } else {
            SyncStatus::Partial
        };

        self.append_sync_log(&identity, &report);

        info!(
            status = ?report.status,
            uploaded = report.uploaded.len(),
            downloaded_new = report.downloaded_new.len(),
            downloaded_updated = report.downloaded_updated.len(),
            local_newer = report.local_newer.len(),
            errors = report.errors.len(),
            "sync pass finished"
        );
        finish(report, start)
    }

    fn upload_phase(&self, identity: &Identity, report: &mut SyncReport) -> Result<()> {
        let records: Vec<Record> = {
            let store = self.store.lock();
            store
                .list_records()
                .iter()
                .filter_map(|name| store.record(name))
                .collect()
        };

        for record in records {
            if record.is_synced() {
                debug!(name = record.name(), "unchanged since last sync");
                continue;
            }
            match self.upload_record(identity, &record) {
                Ok(outcome) => {
                    debug!(
                        name = record.name(),
                        remote_id = %outcome.id,
                        created = outcome.created,
                        "record uploaded"
                    );
                    report.uploaded.push(record.name().to_string());
                    self.stamp_last_synced(&record);
                }
                Err(err) => {
                    warn!(name = record.name(), error = %err, "upload failed");
                    report
                        .errors
                        .push(SyncErrorEntry::record(record.name(), err.to_string()));
                }
            }
        }
        Ok(())
    }

    fn upload_record(&self, identity: &Identity, record: &Record) -> Result<UpsertOutcome> {
        let updated_at = RemoteTimestamp::from_raw(record.updated_at_raw())
            .or_else(|| RemoteTimestamp::from_raw(record.created_at_raw()))
            .unwrap_or(RemoteTimestamp::ServerAssigned);
        let created_at = RemoteTimestamp::from_raw(record.created_at_raw())
            .unwrap_or(RemoteTimestamp::ServerAssigned);
        let payload = RecordPayload {
            name: record.name().to_string(),
            body: record.body(),
            owner_id: identity.user_id.clone(),
            updated_at,
            created_at,
        };
        self.backend.upsert(&identity.user_id, record.name(), &payload)
    }

    fn stamp_last_synced(&self, record: &Record) {
        let Some(raw) = record.updated_at_raw().or(record.created_at_raw()) else {
            return;
        };
        let mut store = self.store.lock();
        if let Some(mut current) = store.record(record.name()) {
            current.set_last_synced_at_raw(raw);
            store.put_record_verbatim(current);
        }
    }

    fn download_phase(&self, identity: &Identity, report: &mut SyncReport) -> Result<()> {
        let remote = self.backend.fetch_all(&identity.user_id)?;
        for (name, data) in remote {
            if let Err(err) = self.apply_remote_record(&name, &data, report) {
                warn!(name = %name, error = %err, "applying remote record failed");
                report
                    .errors
                    .push(SyncErrorEntry::record(&name, err.to_string()));
            }
        }
        Ok(())
    }

    fn apply_remote_record(
        &self,
        name: &str,
        data: &Map<String, Value>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let remote_updated = data.get(UPDATED_AT).and_then(Value::as_str);
        let mut store = self.store.lock();

        match store.record(name) {
            None => {
                let record = record_from_wire(name, data)?;
                store.put_record_verbatim(record);
                report.downloaded_new.push(name.to_string());
            }
            Some(local) => {
                if is_remote_newer(remote_updated, local.updated_at_raw()) {
                    let mut record = record_from_wire(name, data)?;
                    // The remote copy may predate createdAt tracking; the
                    // local value is set once and survives the overwrite.
                    if record.created_at_raw().is_none() {
                        if let Some(created) = local.created_at() {
                            record.set_created_at(created);
                        }
                    }
                    store.put_record_verbatim(record);
                    report.downloaded_updated.push(name.to_string());
                } else {
                    report.local_newer.push(name.to_string());
                }
            }
        }
        Ok(())
    }

    /// Best-effort remote audit trail; failures are logged and never become
    /// record errors.
    fn append_sync_log(&self, identity: &Identity, report: &SyncReport) {
        let entry = json!({
            "at": RemoteTimestamp::ServerAssigned.to_wire(),
            "status": report.status,
            "uploaded": report.uploaded.len(),
            "downloadedNew": report.downloaded_new.len(),
            "downloadedUpdated": report.downloaded_updated.len(),
            "errors": report.errors.len(),
        });
        match self.backend.append_log(&identity.user_id, &entry) {
            Ok(_) => debug!("sync log appended"),
            Err(err) => debug!(error = %err, "sync log append skipped"),
        }
    }

    /// Delete a record. This is an explicit operation outside the sync pass:
    /// the local delete is authoritative and persisted, the remote delete is
    /// propagated best-effort. Returns whether the record existed locally.
    pub fn delete_record(&self, name: &str) -> Result<bool> {
        let existed = {
            let mut store = self.store.lock();
            let existed = store.delete_record(name);
            if existed {
                store.persist()?;
            }
            existed
        };
        if !existed {
            return Ok(false);
        }
        info!(name, "record deleted locally");

        if let Some(identity) = self.identity.current() {
            if self.backend.is_available() {
                self.backend.set_auth_token(Some(&identity.token));
                if let Err(err) = self.backend.remove(&identity.user_id, name) {
                    warn!(name, error = %err, "remote delete not propagated");
                }
            }
        }
        Ok(true)
    }

    /// Merge a partial field map into a local record (advancing `updatedAt`),
    /// persist, and push the partial update remotely best-effort. Returns
    /// whether the record existed.
    pub fn push_record_fields(&self, name: &str, partial: Map<String, Value>) -> Result<bool> {
        let updated_at = {
            let mut store = self.store.lock();
            let Some(record) = store.record(name) else {
                return Ok(false);
            };
            let mut fields = record.into_fields();
            for (key, value) in &partial {
                fields.insert(key.clone(), value.clone());
            }
            let mut record = Record::new(name, fields);
            let now = Utc::now();
            record.set_updated_at(now);
            store.put_record_verbatim(record);
            store.persist()?;
            now
        };

        if let Some(identity) = self.identity.current() {
            if self.backend.is_available() {
                self.backend.set_auth_token(Some(&identity.token));
                // Remote documents nest user fields under `body`.
                let mut remote_partial = Map::new();
                remote_partial.insert("body".to_string(), Value::Object(partial));
                remote_partial.insert(
                    UPDATED_AT.to_string(),
                    RemoteTimestamp::Explicit(updated_at).to_wire(),
                );
                match self
                    .backend
                    .update_fields(&identity.user_id, name, &remote_partial)
                {
                    Ok(true) => debug!(name, "remote fields updated"),
                    Ok(false) => debug!(name, "record not on remote yet; next sync uploads it"),
                    Err(err) => warn!(name, error = %err, "remote field update not propagated"),
                }
            }
        }
        Ok(true)
    }

    /// Read-only status projection, safe to poll.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            backend_initialized: self.backend.is_available(),
            backend_kind: self.backend.kind(),
            authenticated: self.identity.is_authenticated(),
            principal_hint: self.identity.principal_hint(),
        }
    }

    /// Point-in-time export of the local store under the rotation policy.
    pub fn snapshot_local_store(&self) -> Result<String> {
        let dir = self.config.backup_dir()?;
        let store = self.store.lock();
        backup::snapshot_store(&store, &dir, "records", self.config.backup.keep)
    }
}

fn finish(mut report: SyncReport, start: Instant) -> SyncReport {
    report.duration_ms = start.elapsed().as_millis();
    report
}

/// Build a local record from a fetched wire document
/// (`{name, body, ownerId, updatedAt, createdAt}` with plain ISO strings).
fn record_from_wire(name: &str, data: &Map<String, Value>) -> Result<Record> {
    let mut fields = match data.get("body") {
        Some(Value::Object(body)) => body.clone(),
        Some(other) => {
            return Err(LocritError::MalformedRecord(format!(
                "{name}: body is {other_kind}, expected a map",
                other_kind = json_kind(other)
            )));
        }
        None => Map::new(),
    };
    for key in [UPDATED_AT, CREATED_AT] {
        if let Some(value) = data.get(key).and_then(Value::as_str) {
            fields.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
    let mut record = Record::new(name, fields);
    if let Some(updated) = data.get(UPDATED_AT).and_then(Value::as_str) {
        record.set_last_synced_at_raw(updated);
    }
    Ok(record)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::config::Config;
    use crate::store::SettingsStore;
    use crate::test_utils::MockBackend;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        engine: SyncEngine,
        backend: Arc<MockBackend>,
        store: Arc<Mutex<SettingsStore>>,
    }

    fn fixture() -> Fixture {
        fixture_with(Config::default(), true)
    }

    fn fixture_with(config: Config, authenticated: bool) -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(Mutex::new(
            SettingsStore::open(temp.path().join("settings.yaml")).unwrap(),
        ));
        let backend = Arc::new(MockBackend::new(BackendKind::Document));
        let identity = Arc::new(IdentityContext::new());
        if authenticated {
            identity.set(Identity::new("user-1", "tok"));
        }
        let engine = SyncEngine::new(
            config,
            Arc::clone(&store),
            backend.clone() as Arc<dyn RemoteBackend>,
            identity,
        );
        Fixture {
            _temp: temp,
            engine,
            backend,
            store,
        }
    }

    fn seed_record(fixture: &Fixture, name: &str, updated_at: &str) {
        let fields = json!({
            "description": format!("{name} description"),
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": updated_at,
        });
        fixture
            .store
            .lock()
            .set_record(Record::from_value(name, &fields).unwrap());
    }

    #[test]
    fn disabled_short_circuits_without_backend_calls() {
        let mut config = Config::default();
        config.sync.enabled = false;
        let fx = fixture_with(config, true);

        let report = fx.engine.run_sync();
        assert_eq!(report.status, SyncStatus::Disabled);
        assert_eq!(fx.backend.call_count(), 0);
    }

    #[test]
    fn no_auth_short_circuits_without_backend_calls() {
        let fx = fixture_with(Config::default(), false);
        seed_record(&fx, "a", "2024-01-01T00:00:00Z");

        let report = fx.engine.run_sync();
        assert_eq!(report.status, SyncStatus::NoAuth);
        assert!(report.uploaded.is_empty());
        assert_eq!(fx.backend.call_count(), 0);
    }

    #[test]
    fn unavailable_backend_short_circuits() {
        let fx = fixture();
        fx.backend.set_available(false);

        let report = fx.engine.run_sync();
        assert_eq!(report.status, SyncStatus::BackendUnavailable);
        assert_eq!(fx.backend.call_count(), 0);
    }

    #[test]
    fn uploads_local_record_and_stamps_last_synced() {
        let fx = fixture();
        seed_record(&fx, "A", "2024-01-01T00:00:00Z");

        let report = fx.engine.run_sync();
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.uploaded, vec!["A".to_string()]);
        assert!(report.errors.is_empty());

        let remote = fx.backend.remote_snapshot();
        assert!(remote.contains_key("A"));
        assert_eq!(remote["A"]["ownerId"], "user-1");

        let local = fx.store.lock().record("A").unwrap();
        assert_eq!(local.last_synced_at_raw(), local.updated_at_raw());
    }

    #[test]
    fn downloads_remote_only_record_verbatim() {
        let fx = fixture();
        fx.backend.seed_remote(
            "B",
            json!({
                "name": "B",
                "ownerId": "user-1",
                "updatedAt": "2024-02-01T00:00:00+00:00",
                "createdAt": "2024-02-01T00:00:00+00:00",
                "body": { "description": "remote only" },
            }),
        );

        let report = fx.engine.run_sync();
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.downloaded_new, vec!["B".to_string()]);

        let local = fx.store.lock().record("B").unwrap();
        assert_eq!(local.fields()["description"], "remote only");
        assert_eq!(local.updated_at_raw(), Some("2024-02-01T00:00:00+00:00"));
    }

    #[test]
    fn newer_remote_overwrites_local_body() {
        let fx = fixture();
        seed_record(&fx, "C", "2024-01-01T00:00:00Z");
        fx.backend.seed_remote(
            "C",
            json!({
                "name": "C",
                "ownerId": "user-1",
                "updatedAt": "2024-03-01T00:00:00+00:00",
                "body": { "description": "remote wins" },
            }),
        );

        let report = fx.engine.run_sync();
        assert_eq!(report.downloaded_updated, vec!["C".to_string()]);

        let local = fx.store.lock().record("C").unwrap();
        assert_eq!(local.fields()["description"], "remote wins");
        // Remote lacked createdAt; the local one survives the overwrite.
        assert_eq!(local.created_at_raw(), Some("2024-01-01T00:00:00+00:00"));
    }

    #[test]
    fn older_remote_is_reported_local_newer() {
        let fx = fixture();
        seed_record(&fx, "C", "2024-03-01T00:00:00Z");
        fx.backend.seed_remote(
            "C",
            json!({
                "name": "C",
                "updatedAt": "2024-01-01T00:00:00+00:00",
                "body": { "description": "stale" },
            }),
        );

        let report = fx.engine.run_sync();
        assert!(report.downloaded_updated.is_empty());
        assert_eq!(report.local_newer, vec!["C".to_string()]);
        let local = fx.store.lock().record("C").unwrap();
        assert_eq!(local.fields()["description"], "C description");
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let fx = fixture();
        seed_record(&fx, "A", "2024-01-01T00:00:00Z");
        fx.backend.seed_remote(
            "B",
            json!({
                "name": "B",
                "updatedAt": "2024-02-01T00:00:00+00:00",
                "body": {},
            }),
        );

        let first = fx.engine.run_sync();
        assert_eq!(first.uploaded, vec!["A".to_string()]);
        assert_eq!(first.downloaded_new, vec!["B".to_string()]);

        let second = fx.engine.run_sync();
        assert_eq!(second.status, SyncStatus::Success);
        assert!(second.uploaded.is_empty());
        assert!(second.downloaded_new.is_empty());
        assert!(second.downloaded_updated.is_empty());
        assert!(second.errors.is_empty());
    }

    #[test]
    fn one_failing_upload_does_not_stop_the_batch() {
        let fx = fixture();
        seed_record(&fx, "a", "2024-01-01T00:00:00Z");
        seed_record(&fx, "b", "2024-01-01T00:00:00Z");
        seed_record(&fx, "c", "2024-01-01T00:00:00Z");
        fx.backend.fail_upsert_of("b");

        let report = fx.engine.run_sync();
        assert_eq!(report.status, SyncStatus::Partial);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].name.as_deref(), Some("b"));
        assert_eq!(report.uploaded.len(), 2);
    }

    #[test]
    fn fetch_all_failure_is_a_pass_level_error() {
        let fx = fixture();
        seed_record(&fx, "a", "2024-01-01T00:00:00Z");
        fx.backend.fail_fetch_all();

        let report = fx.engine.run_sync();
        assert_eq!(report.status, SyncStatus::Partial);
        assert_eq!(report.uploaded, vec!["a".to_string()]);
        assert!(report.errors.iter().any(|e| e.name.is_none()));
    }

    #[test]
    fn malformed_remote_body_is_an_isolated_record_error() {
        let fx = fixture();
        fx.backend.seed_remote(
            "bad",
            json!({ "name": "bad", "updatedAt": "2024-01-01T00:00:00Z", "body": 42 }),
        );
        fx.backend.seed_remote(
            "good",
            json!({ "name": "good", "updatedAt": "2024-01-01T00:00:00Z", "body": {} }),
        );

        let report = fx.engine.run_sync();
        assert_eq!(report.status, SyncStatus::Partial);
        assert_eq!(report.downloaded_new, vec!["good".to_string()]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].name.as_deref(), Some("bad"));
    }

    #[test]
    fn persist_failure_downgrades_to_partial() {
        let fx = fixture();
        seed_record(&fx, "a", "2024-01-01T00:00:00Z");

        // Make the rename target un-writable by turning it into a directory.
        let path = fx.store.lock().path().to_path_buf();
        std::fs::create_dir_all(&path).unwrap();

        let report = fx.engine.run_sync();
        assert_eq!(report.status, SyncStatus::Partial);
        assert_eq!(report.uploaded, vec!["a".to_string()]);
        assert!(report
            .errors
            .iter()
            .any(|e| e.name.is_none() && e.message.contains("persist")));
    }

    #[test]
    fn sync_log_is_appended_best_effort() {
        let fx = fixture();
        seed_record(&fx, "a", "2024-01-01T00:00:00Z");

        fx.engine.run_sync();
        let log = fx.backend.log_snapshot();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0]["uploaded"], 1);
    }

    #[test]
    fn delete_record_propagates_best_effort() {
        let fx = fixture();
        seed_record(&fx, "a", "2024-01-01T00:00:00Z");
        fx.engine.run_sync();
        assert!(fx.backend.remote_snapshot().contains_key("a"));

        assert!(fx.engine.delete_record("a").unwrap());
        assert!(fx.store.lock().record("a").is_none());
        assert!(!fx.backend.remote_snapshot().contains_key("a"));

        assert!(!fx.engine.delete_record("a").unwrap());
    }

    #[test]
    fn sync_never_deletes_local_records() {
        let fx = fixture();
        seed_record(&fx, "kept", "2024-01-01T00:00:00Z");
        // Remote is empty; the record must survive the pass.
        fx.engine.run_sync();
        assert!(fx.store.lock().record("kept").is_some());
    }

    #[test]
    fn push_record_fields_advances_updated_at() {
        let fx = fixture();
        seed_record(&fx, "a", "2024-01-01T00:00:00Z");
        let before = fx.store.lock().record("a").unwrap().updated_at().unwrap();

        let mut partial = Map::new();
        partial.insert("description".to_string(), json!("renamed"));
        assert!(fx.engine.push_record_fields("a", partial).unwrap());

        let after = fx.store.lock().record("a").unwrap();
        assert_eq!(after.fields()["description"], "renamed");
        assert!(after.updated_at().unwrap() > before);
        assert!(!fx.engine.push_record_fields("missing", Map::new()).unwrap());
    }

    #[test]
    fn status_reflects_backend_and_identity() {
        let fx = fixture();
        let status = fx.engine.status();
        assert!(status.backend_initialized);
        assert_eq!(status.backend_kind, BackendKind::Document);
        assert!(status.authenticated);
        assert_eq!(status.principal_hint.as_deref(), Some("user-1"));
    }

    #[test]
    fn report_serializes_with_camel_case_keys() {
        let report = SyncReport::empty(SyncStatus::NoAuth);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "no_auth");
        assert!(value.get("downloadedNew").is_some());
        assert!(value.get("localNewer").is_some());
    }
}
