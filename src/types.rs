use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Maximum number of characters of the serialized record kept in `logText`.
pub const MAX_LOG_TEXT_LENGTH: usize = 5000;
/// Maximum number of characters of the record's `snippet` kept in storage.
pub const MAX_SNIPPET_LENGTH: usize = 1000;

/// A single client-side log record as submitted by the caller.
///
/// The shape is open-ended: any JSON object is accepted and its fields are kept
/// in the order they were received, which keeps serialization (and therefore
/// fingerprinting) reproducible.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(transparent)]
pub struct LogRecord(Map<String, Value>);

impl LogRecord {
    /// Converts an arbitrary JSON value into a record, if it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Renders a well-known field as text for the stored entity.
    ///
    /// Strings are returned verbatim, a missing field, `null` and `false`
    /// become an empty string, and anything else is rendered as compact JSON.
    pub fn text_field(&self, key: &str) -> String {
        match self.0.get(key) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Returns the compact JSON text of the record.
    pub fn to_json_text(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

/// Lowercase hex SHA-256 digest identifying a log record's content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A log record as persisted in the history table.
///
/// Entities are append-only: written once when a fingerprint is first seen and
/// never updated afterwards.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoredLogEntity {
    /// UTC ingestion date, `YYYY-MM-DD`.
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    /// Random identifier, unrelated to the record's content.
    #[serde(rename = "RowKey")]
    pub row_key: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "logText")]
    pub log_text: String,
    #[serde(rename = "logHash")]
    pub log_hash: Fingerprint,
    #[serde(rename = "isNew")]
    pub is_new: bool,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub url: String,
}

/// What happened to a single record while it was deduplicated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The fingerprint was unknown and the entity was written.
    Inserted,
    /// The fingerprint was already present in the history snapshot.
    AlreadyExists,
    /// An earlier record of the same batch carried the same fingerprint.
    DuplicateInBatch,
    /// The fingerprint was unknown but the write failed.
    PersistenceFailed(String),
}

impl InsertOutcome {
    /// Whether the record counts as new for downstream consumers.
    ///
    /// A failed write still reports the record as new.
    pub fn is_new(&self) -> bool {
        matches!(
            self,
            InsertOutcome::Inserted | InsertOutcome::PersistenceFailed(_)
        )
    }
}

/// A log record annotated with its fingerprint and novelty flag.
///
/// Serializes as the original record's fields followed by `logHash` and
/// `_isNew`, overwriting any caller-supplied fields of the same name.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedLog {
    pub record: LogRecord,
    pub fingerprint: Fingerprint,
    pub outcome: InsertOutcome,
}

impl AnnotatedLog {
    pub fn is_new(&self) -> bool {
        self.outcome.is_new()
    }
}

impl Serialize for AnnotatedLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.record.fields();
        let extra = ["logHash", "_isNew"]
            .iter()
            .filter(|key| !fields.contains_key(**key))
            .count();
        let mut map = serializer.serialize_map(Some(fields.len() + extra))?;
        for (key, value) in fields {
            match key.as_str() {
                "logHash" => map.serialize_entry(key, &self.fingerprint)?,
                "_isNew" => map.serialize_entry(key, &self.is_new())?,
                _ => map.serialize_entry(key, value)?,
            }
        }
        if !fields.contains_key("logHash") {
            map.serialize_entry("logHash", &self.fingerprint)?;
        }
        if !fields.contains_key("_isNew") {
            map.serialize_entry("_isNew", &self.is_new())?;
        }
        map.end()
    }
}

/// Truncates `s` to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
