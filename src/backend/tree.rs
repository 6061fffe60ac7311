//! Tree backend: path-addressed read/write/delete on a hierarchical store.
//!
//! Paths are deterministic (`users/{scope}/records/{record_id}`), so no
//! query support is needed — and none exists. The store cannot hold rich
//! timestamp objects: every typed timestamp is flattened to a plain
//! ISO-8601 string (recursively) before writing, with the server-assigned
//! sentinel resolved client-side. Because a write does not reveal whether
//! the path existed before, `created` in the upsert outcome is best-effort
//! and only suitable for logging.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::Result;

use super::http::HttpGateway;
use super::{timestamps_to_iso, BackendKind, RecordPayload, RemoteBackend, UpsertOutcome};

pub struct TreeBackend {
    gateway: HttpGateway,
}

impl TreeBackend {
    /// Connect and probe the endpoint.
    pub fn connect(base_url: &str, timeout: Duration) -> Result<Self> {
        let gateway = HttpGateway::new("tree", base_url, timeout)?;
        gateway.probe("/ping.json")?;
        info!(url = %base_url, "tree backend reachable");
        Ok(Self { gateway })
    }

    fn record_path(scope: &str, record_id: &str) -> String {
        format!("/users/{scope}/records/{record_id}.json")
    }

    fn exists(&self, scope: &str, record_id: &str) -> Result<bool> {
        Ok(self
            .gateway
            .get_json(&Self::record_path(scope, record_id))?
            .is_some())
    }
}

impl RemoteBackend for TreeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tree
    }

    fn is_available(&self) -> bool {
        true
    }

    fn set_auth_token(&self, token: Option<&str>) {
        self.gateway.set_auth_token(token);
    }

    fn upsert(
        &self,
        scope: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> Result<UpsertOutcome> {
        let flat = timestamps_to_iso(&payload.to_wire(), Utc::now());
        self.gateway
            .send_json(Method::PUT, &Self::record_path(scope, record_id), &flat)?;
        debug!(scope, record_id, "tree path written");
        Ok(UpsertOutcome {
            id: format!("{scope}/{record_id}"),
            created: false,
        })
    }

    fn fetch_all(&self, scope: &str) -> Result<BTreeMap<String, Map<String, Value>>> {
        let mut records = BTreeMap::new();
        let Some(response) = self
            .gateway
            .get_json(&format!("/users/{scope}/records.json"))?
        else {
            return Ok(records);
        };
        let Some(map) = response.as_object() else {
            return Ok(records);
        };
        for (record_id, value) in map {
            if let Some(fields) = value.as_object() {
                records.insert(record_id.clone(), fields.clone());
            }
        }
        Ok(records)
    }

    fn update_fields(
        &self,
        scope: &str,
        record_id: &str,
        partial: &Map<String, Value>,
    ) -> Result<bool> {
        // A tree PATCH would create the path; read first so the contract's
        // "was there something to update" answer stays truthful.
        if !self.exists(scope, record_id)? {
            return Ok(false);
        }
        let flat = timestamps_to_iso(&Value::Object(partial.clone()), Utc::now());
        self.gateway
            .send_json(Method::PATCH, &Self::record_path(scope, record_id), &flat)?;
        Ok(true)
    }

    fn append_log(&self, scope: &str, entry: &Value) -> Result<bool> {
        let flat = timestamps_to_iso(entry, Utc::now());
        self.gateway
            .send_json(Method::POST, &format!("/users/{scope}/sync_log.json"), &flat)?;
        Ok(true)
    }

    fn remove(&self, scope: &str, record_id: &str) -> Result<bool> {
        if !self.exists(scope, record_id)? {
            return Ok(false);
        }
        self.gateway.delete(&Self::record_path(scope, record_id))?;
        Ok(true)
    }
}
