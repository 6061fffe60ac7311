//! Test doubles for the sync engine.
//!
//! [`MockBackend`] is an in-memory stand-in for a remote store: it records
//! every operation, supports per-record failure injection, and mirrors the
//! real backends' read normalization (typed wire timestamps come back as
//! plain ISO-8601 strings). Used by the in-crate engine tests and the
//! integration tests under `tests/`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::backend::{
    timestamps_to_iso, BackendKind, RecordPayload, RemoteBackend, UpsertOutcome,
};
use crate::error::{LocritError, Result};

#[derive(Debug, Default)]
struct MockState {
    remote: BTreeMap<String, Value>,
    log: Vec<Value>,
    calls: Vec<String>,
    fail_upserts: BTreeSet<String>,
    fail_fetch_all: bool,
    auth_token: Option<String>,
}

/// In-memory remote backend with call recording and failure injection.
#[derive(Debug)]
pub struct MockBackend {
    kind: BackendKind,
    available: Mutex<bool>,
    state: Mutex<MockState>,
}

impl MockBackend {
    #[must_use]
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            available: Mutex::new(true),
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn set_available(&self, available: bool) {
        *self.available.lock() = available;
    }

    /// Pre-populate the remote side with a wire document.
    pub fn seed_remote(&self, record_id: &str, document: Value) {
        self.state
            .lock()
            .remote
            .insert(record_id.to_string(), document);
    }

    /// Make the next upserts of this record fail.
    pub fn fail_upsert_of(&self, record_id: &str) {
        self.state.lock().fail_upserts.insert(record_id.to_string());
    }

    pub fn fail_fetch_all(&self) {
        self.state.lock().fail_fetch_all = true;
    }

    /// Number of I/O operations performed (auth installation not counted).
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    #[must_use]
    pub fn remote_snapshot(&self) -> BTreeMap<String, Value> {
        self.state.lock().remote.clone()
    }

    #[must_use]
    pub fn log_snapshot(&self) -> Vec<Value> {
        self.state.lock().log.clone()
    }

    #[must_use]
    pub fn auth_token(&self) -> Option<String> {
        self.state.lock().auth_token.clone()
    }

    fn record_call(&self, state: &mut MockState, op: &str, target: &str) {
        state.calls.push(format!("{op}:{target}"));
    }
}

impl RemoteBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        *self.available.lock()
    }

    fn set_auth_token(&self, token: Option<&str>) {
        self.state.lock().auth_token = token.map(String::from);
    }

    fn upsert(
        &self,
        _scope: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> Result<UpsertOutcome> {
        let mut state = self.state.lock();
        self.record_call(&mut state, "upsert", record_id);
        if state.fail_upserts.contains(record_id) {
            return Err(LocritError::backend("mock", format!("injected failure for {record_id}")));
        }
        let document = timestamps_to_iso(&payload.to_wire(), Utc::now());
        let created = state
            .remote
            .insert(record_id.to_string(), document)
            .is_none();
        Ok(UpsertOutcome {
            id: record_id.to_string(),
            created,
        })
    }

    fn fetch_all(&self, scope: &str) -> Result<BTreeMap<String, Map<String, Value>>> {
        let mut state = self.state.lock();
        self.record_call(&mut state, "fetch_all", scope);
        if state.fail_fetch_all {
            return Err(LocritError::backend("mock", "injected fetch_all failure"));
        }
        Ok(state
            .remote
            .iter()
            .filter_map(|(id, doc)| {
                doc.as_object().map(|fields| (id.clone(), fields.clone()))
            })
            .collect())
    }

    fn update_fields(
        &self,
        _scope: &str,
        record_id: &str,
        partial: &Map<String, Value>,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        self.record_call(&mut state, "update_fields", record_id);
        let Some(Value::Object(existing)) = state.remote.get_mut(record_id) else {
            return Ok(false);
        };
        let merged = timestamps_to_iso(&Value::Object(partial.clone()), Utc::now());
        if let Value::Object(merged) = merged {
            for (key, value) in merged {
                existing.insert(key, value);
            }
        }
        Ok(true)
    }

    fn append_log(&self, scope: &str, entry: &Value) -> Result<bool> {
        let mut state = self.state.lock();
        self.record_call(&mut state, "append_log", scope);
        let entry = timestamps_to_iso(entry, Utc::now());
        state.log.push(entry);
        Ok(true)
    }

    fn remove(&self, _scope: &str, record_id: &str) -> Result<bool> {
        let mut state = self.state.lock();
        self.record_call(&mut state, "remove", record_id);
        Ok(state.remote.remove(record_id).is_some())
    }
}
