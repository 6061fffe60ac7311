//! Agent record model.
//!
//! A [`Record`] is the unit of synchronization: a named, owner-scoped map of
//! free-form fields. The schema is intentionally loose — description, model
//! reference, visibility flags, nested access-policy maps all live in the
//! open field map — except for three reserved timestamp fields the engine
//! reads and writes through typed accessors:
//!
//! - `createdAt`: set once at first write, never overwritten by updates.
//! - `updatedAt`: stamped on every mutating write; the sole conflict key.
//! - `lastSyncedAt`: local-only bookkeeping, the `updatedAt` value last
//!   confirmed present on the remote side. Never persisted remotely.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Reserved field: creation timestamp, RFC 3339.
pub const CREATED_AT: &str = "createdAt";
/// Reserved field: last-modification timestamp, RFC 3339. Conflict key.
pub const UPDATED_AT: &str = "updatedAt";
/// Reserved field: local-only sync bookkeeping, RFC 3339.
pub const LAST_SYNCED_AT: &str = "lastSyncedAt";

/// Parse an RFC 3339 timestamp, returning `None` for anything malformed.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// A named agent record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: String,
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record from a name and its open field map.
    pub fn new(name: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Build a record from a stored value. Returns `None` unless the value
    /// is a map.
    pub fn from_value(name: impl Into<String>, value: &Value) -> Option<Self> {
        value
            .as_object()
            .map(|fields| Self::new(name, fields.clone()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full field map, reserved fields included.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The open body: every field except the reserved timestamps. This is
    /// what goes over the wire as the record's `body`.
    #[must_use]
    pub fn body(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(key, _)| {
                key.as_str() != CREATED_AT
                    && key.as_str() != UPDATED_AT
                    && key.as_str() != LAST_SYNCED_AT
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    fn timestamp_field(&self, key: &str) -> Option<DateTime<Utc>> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }

    fn raw_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_field(CREATED_AT)
    }

    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_field(UPDATED_AT)
    }

    #[must_use]
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_field(LAST_SYNCED_AT)
    }

    /// The raw `updatedAt` string as stored, unparsed.
    #[must_use]
    pub fn updated_at_raw(&self) -> Option<&str> {
        self.raw_field(UPDATED_AT)
    }

    #[must_use]
    pub fn created_at_raw(&self) -> Option<&str> {
        self.raw_field(CREATED_AT)
    }

    #[must_use]
    pub fn last_synced_at_raw(&self) -> Option<&str> {
        self.raw_field(LAST_SYNCED_AT)
    }

    pub fn set_created_at(&mut self, value: DateTime<Utc>) {
        self.fields
            .insert(CREATED_AT.to_string(), Value::String(value.to_rfc3339()));
    }

    pub fn set_updated_at(&mut self, value: DateTime<Utc>) {
        self.fields
            .insert(UPDATED_AT.to_string(), Value::String(value.to_rfc3339()));
    }

    /// Stamp `lastSyncedAt` with the exact raw string confirmed remote, so a
    /// later equality check against `updatedAt` needs no parsing.
    pub fn set_last_synced_at_raw(&mut self, value: &str) {
        self.fields.insert(
            LAST_SYNCED_AT.to_string(),
            Value::String(value.to_string()),
        );
    }

    /// Whether the current `updatedAt` has already been confirmed on the
    /// remote side. A record with no `updatedAt` at all is never considered
    /// synced.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        match (self.updated_at_raw(), self.last_synced_at_raw()) {
            (Some(updated), Some(synced)) => updated == synced,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Record {
        let fields = json!({
            "description": "trail guide",
            "model": "sonnet",
            "access": { "public": false },
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-02-01T00:00:00Z",
            "lastSyncedAt": "2024-02-01T00:00:00Z",
        });
        Record::from_value("gruffle", &fields).unwrap()
    }

    #[test]
    fn body_excludes_reserved_fields() {
        let body = sample().body();
        assert!(body.contains_key("description"));
        assert!(body.contains_key("access"));
        assert!(!body.contains_key(CREATED_AT));
        assert!(!body.contains_key(UPDATED_AT));
        assert!(!body.contains_key(LAST_SYNCED_AT));
    }

    #[test]
    fn typed_accessors_parse_rfc3339() {
        let record = sample();
        assert_eq!(
            record.created_at().unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
        assert!(record.updated_at() > record.created_at());
    }

    #[test]
    fn malformed_timestamp_reads_as_none() {
        let fields = json!({ "updatedAt": "not a date" });
        let record = Record::from_value("x", &fields).unwrap();
        assert!(record.updated_at().is_none());
        assert_eq!(record.updated_at_raw(), Some("not a date"));
    }

    #[test]
    fn is_synced_compares_raw_strings() {
        let mut record = sample();
        assert!(record.is_synced());
        record.set_updated_at(Utc::now());
        assert!(!record.is_synced());
    }

    #[test]
    fn record_without_timestamps_is_not_synced() {
        let record = Record::from_value("x", &json!({ "description": "d" })).unwrap();
        assert!(!record.is_synced());
    }
}
