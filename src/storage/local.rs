//! Embedded history store backed by `sled`.
use super::history::{new_entity, FingerprintOnly, HistoryStore};
use crate::error::StoreResult;
use crate::types::{Fingerprint, LogRecord, StoredLogEntity};
use async_trait::async_trait;
use chrono::Utc;
use sled::Db;
use std::collections::HashSet;
use tracing::warn;

/// A `HistoryStore` implementation using `sled` for storage.
///
/// Each entity lives under the key `"{partitionKey}/{rowKey}"` in a tree named
/// after the configured table.
pub struct SledHistoryStore {
    tree: sled::Tree,
}

impl SledHistoryStore {
    /// Creates a new `SledHistoryStore`.
    ///
    /// # Arguments
    ///
    /// * `db` - The `sled::Db` instance to use for storage.
    /// * `table_name` - The name of the tree holding the entities.
    ///
    /// # Errors
    ///
    /// This function will return an error if the tree cannot be opened.
    pub fn new(db: Db, table_name: &str) -> StoreResult<Self> {
        let tree = db.open_tree(table_name)?;
        Ok(Self { tree })
    }

    fn make_key(entity: &StoredLogEntity) -> String {
        format!("{}/{}", entity.partition_key, entity.row_key)
    }
}

#[async_trait]
impl HistoryStore for SledHistoryStore {
    async fn list_all_fingerprints(&self) -> StoreResult<HashSet<Fingerprint>> {
        let mut fingerprints = HashSet::new();

        for result in self.tree.iter() {
            let (key, value) = result?;
            match serde_json::from_slice::<FingerprintOnly>(&value) {
                Ok(FingerprintOnly {
                    log_hash: Some(hash),
                }) => {
                    fingerprints.insert(hash);
                }
                Ok(_) => {}
                Err(e) => warn!(
                    key = %String::from_utf8_lossy(&key),
                    "Skipping unreadable history entity: {}", e
                ),
            }
        }

        Ok(fingerprints)
    }

    async fn insert(
        &self,
        record: &LogRecord,
        fingerprint: &Fingerprint,
    ) -> StoreResult<StoredLogEntity> {
        let entity = new_entity(record, fingerprint, Utc::now());
        let key = Self::make_key(&entity);
        let value = serde_json::to_vec(&entity)?;

        self.tree.insert(key.as_bytes(), value)?;
        self.tree.flush_async().await?;
        Ok(entity)
    }
}
