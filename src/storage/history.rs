//! This module defines the storage interface for the log history: the
//! append-only collection of fingerprinted log entities.
use crate::error::StoreResult;
use crate::types::{
    truncate_chars, Fingerprint, LogRecord, StoredLogEntity, MAX_LOG_TEXT_LENGTH,
    MAX_SNIPPET_LENGTH,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

/// A trait for reading and appending to the log history.
#[async_trait]
pub trait HistoryStore {
    /// Collects the fingerprint of every stored entity.
    ///
    /// This scans the entire history; entities without a fingerprint are
    /// skipped.
    ///
    /// # Errors
    ///
    /// This function will return an error if the history cannot be read.
    async fn list_all_fingerprints(&self) -> StoreResult<HashSet<Fingerprint>>;

    /// Appends a new entity for a record.
    ///
    /// # Arguments
    ///
    /// * `record` - The `LogRecord` to persist.
    /// * `fingerprint` - The record's `Fingerprint`, stored as `logHash`.
    ///
    /// # Returns
    ///
    /// The `StoredLogEntity` that was written.
    ///
    /// # Errors
    ///
    /// This function will return an error if the entity cannot be written.
    async fn insert(
        &self,
        record: &LogRecord,
        fingerprint: &Fingerprint,
    ) -> StoreResult<StoredLogEntity>;
}

/// Projection used when only the fingerprint of a stored entity is needed.
#[derive(Deserialize)]
pub(crate) struct FingerprintOnly {
    #[serde(rename = "logHash", default)]
    pub log_hash: Option<Fingerprint>,
}

/// Builds the entity persisted for a newly seen record.
///
/// The partition key is the UTC date of `now` and the row key a fresh random
/// UUID. `logText` and `snippet` are silently truncated.
pub fn new_entity(
    record: &LogRecord,
    fingerprint: &Fingerprint,
    now: DateTime<Utc>,
) -> StoredLogEntity {
    let log_text = record.to_json_text();
    let snippet = match record.get("snippet") {
        Some(Value::String(s)) => truncate_chars(s, MAX_SNIPPET_LENGTH).to_string(),
        _ => String::new(),
    };

    StoredLogEntity {
        partition_key: now.format("%Y-%m-%d").to_string(),
        row_key: Uuid::new_v4().to_string(),
        created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        log_text: truncate_chars(&log_text, MAX_LOG_TEXT_LENGTH).to_string(),
        log_hash: fingerprint.clone(),
        is_new: true,
        snippet,
        message: record.text_field("message"),
        level: record.text_field("level"),
        url: record.text_field("url"),
    }
}
