//! Document backend: collection/document semantics with equality queries.
//!
//! Records live at `users/{scope}/records` as documents with server-assigned
//! opaque IDs, so an upsert first queries by `name` equality to avoid
//! creating duplicates; `created` is true only when no prior document
//! matched. Native typed timestamp objects (including the server-assigned
//! sentinel) pass through to the store untouched.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::Result;

use super::http::HttpGateway;
use super::{timestamps_to_iso, BackendKind, RecordPayload, RemoteBackend, UpsertOutcome};

/// Equality query request against a collection.
#[derive(Debug, Clone, Serialize)]
struct QueryRequest<'a> {
    #[serde(rename = "where")]
    filter: QueryFilter<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct QueryFilter<'a> {
    field: &'a str,
    op: &'a str,
    value: &'a str,
}

/// A stored document as returned by the collection endpoints.
#[derive(Debug, Clone, Deserialize)]
struct DocumentEnvelope {
    id: String,
    #[serde(default)]
    fields: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct DocumentList {
    #[serde(default)]
    documents: Vec<DocumentEnvelope>,
}

pub struct DocumentBackend {
    gateway: HttpGateway,
}

impl DocumentBackend {
    /// Connect and probe the endpoint. A transport-level failure here makes
    /// the caller fall back to the tree backend.
    pub fn connect(base_url: &str, timeout: Duration) -> Result<Self> {
        let gateway = HttpGateway::new("document", base_url, timeout)?;
        gateway.probe("/ping")?;
        info!(url = %base_url, "document backend reachable");
        Ok(Self { gateway })
    }

    fn records_path(scope: &str) -> String {
        format!("/users/{scope}/records")
    }

    /// Find the document whose `name` field equals `record_id`, if any.
    fn find_by_name(&self, scope: &str, record_id: &str) -> Result<Option<DocumentEnvelope>> {
        let request = QueryRequest {
            filter: QueryFilter {
                field: "name",
                op: "==",
                value: record_id,
            },
        };
        let response = self.gateway.send_json(
            Method::POST,
            &format!("{}/query", Self::records_path(scope)),
            &serde_json::to_value(&request)?,
        )?;
        let list: DocumentList = serde_json::from_value(response)?;
        Ok(list.documents.into_iter().next())
    }
}

impl RemoteBackend for DocumentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
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
        let wire = json!({ "fields": payload.to_wire() });
        match self.find_by_name(scope, record_id)? {
            Some(existing) => {
                self.gateway.send_json(
                    Method::PUT,
                    &format!("{}/{}", Self::records_path(scope), existing.id),
                    &wire,
                )?;
                debug!(scope, record_id, doc_id = %existing.id, "document replaced");
                Ok(UpsertOutcome {
                    id: existing.id,
                    created: false,
                })
            }
            None => {
                let response =
                    self.gateway
                        .send_json(Method::POST, &Self::records_path(scope), &wire)?;
                let id = response
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or(record_id)
                    .to_string();
                debug!(scope, record_id, doc_id = %id, "document created");
                Ok(UpsertOutcome { id, created: true })
            }
        }
    }

    fn fetch_all(&self, scope: &str) -> Result<BTreeMap<String, Map<String, Value>>> {
        let mut records = BTreeMap::new();
        let Some(response) = self.gateway.get_json(&Self::records_path(scope))? else {
            return Ok(records);
        };
        let list: DocumentList = serde_json::from_value(response)?;
        let now = Utc::now();
        for doc in list.documents {
            let decoded = timestamps_to_iso(&doc.fields, now);
            let Some(fields) = decoded.as_object() else {
                continue;
            };
            let key = fields
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(doc.id.as_str())
                .to_string();
            records.insert(key, fields.clone());
        }
        Ok(records)
    }

    fn update_fields(
        &self,
        scope: &str,
        record_id: &str,
        partial: &Map<String, Value>,
    ) -> Result<bool> {
        let Some(existing) = self.find_by_name(scope, record_id)? else {
            return Ok(false);
        };
        self.gateway.send_json(
            Method::PATCH,
            &format!("{}/{}", Self::records_path(scope), existing.id),
            &json!({ "fields": Value::Object(partial.clone()) }),
        )?;
        Ok(true)
    }

    fn append_log(&self, scope: &str, entry: &Value) -> Result<bool> {
        self.gateway.send_json(
            Method::POST,
            &format!("/users/{scope}/sync_log"),
            &json!({ "fields": entry }),
        )?;
        Ok(true)
    }

    fn remove(&self, scope: &str, record_id: &str) -> Result<bool> {
        let Some(existing) = self.find_by_name(scope, record_id)? else {
            return Ok(false);
        };
        self.gateway
            .delete(&format!("{}/{}", Self::records_path(scope), existing.id))
    }
}
