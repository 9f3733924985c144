//! Content fingerprints for log records.
//!
//! A fingerprint identifies what a record says, not when it was captured: the
//! `timestamp` and `createdAt` fields are dropped before hashing so the same
//! error reported twice hashes identically.
use crate::types::{Fingerprint, LogRecord};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Fields excluded from the fingerprint.
pub const TIMING_FIELDS: [&str; 2] = ["timestamp", "createdAt"];

/// Computes the time-insensitive fingerprint of a record.
///
/// The remaining fields are serialized as compact JSON in the order they were
/// received and hashed with SHA-256. The result is a 64-character lowercase
/// hex string.
pub fn fingerprint(record: &LogRecord) -> Fingerprint {
    let content: Map<String, Value> = record
        .fields()
        .iter()
        .filter(|(key, _)| !TIMING_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let canonical = Value::Object(content).to_string();
    Fingerprint::from_hex(hex::encode(Sha256::digest(canonical.as_bytes())))
}
