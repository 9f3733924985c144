//! Deduplication of incoming log batches against the stored history.
use crate::error::StoreResult;
use crate::fingerprint::fingerprint;
use crate::storage::HistoryStore;
use crate::types::{AnnotatedLog, Fingerprint, InsertOutcome, LogRecord};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Tunables for a `Deduplicator`.
#[derive(Clone, Debug)]
pub struct DedupConfig {
    /// Maximum number of history writes in flight at once.
    pub insert_concurrency: usize,
    /// Whether identical records inside one batch are collapsed to the first.
    pub dedupe_within_batch: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            insert_concurrency: 16,
            dedupe_within_batch: true,
        }
    }
}

/// Annotates log batches with fingerprints and novelty flags, persisting
/// records whose fingerprint has not been seen before.
pub struct Deduplicator {
    store: Arc<dyn HistoryStore + Send + Sync>,
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn HistoryStore + Send + Sync>, config: DedupConfig) -> Self {
        Self { store, config }
    }

    /// Deduplicates a batch.
    ///
    /// The stored fingerprints are read once for the whole batch. Records are
    /// judged in input order; new ones are written concurrently, bounded by
    /// `insert_concurrency`. A failed write is logged and reported as
    /// `InsertOutcome::PersistenceFailed` without affecting the other records.
    ///
    /// # Errors
    ///
    /// Returns an error only if the stored fingerprints cannot be read.
    pub async fn deduplicate(&self, records: Vec<LogRecord>) -> StoreResult<Vec<AnnotatedLog>> {
        let stored = self.store.list_all_fingerprints().await?;
        let judged = self.judge(records, &stored);

        let store = &self.store;
        let annotated: Vec<AnnotatedLog> = stream::iter(judged)
            .map(|(record, fingerprint, settled)| async move {
                let outcome = match settled {
                    Some(outcome) => outcome,
                    None => match store.insert(&record, &fingerprint).await {
                        Ok(entity) => {
                            debug!(%fingerprint, row_key = %entity.row_key, "Stored new log entity");
                            InsertOutcome::Inserted
                        }
                        Err(e) => {
                            error!(%fingerprint, "Failed to store log entity: {}", e);
                            InsertOutcome::PersistenceFailed(e.to_string())
                        }
                    },
                };
                AnnotatedLog {
                    record,
                    fingerprint,
                    outcome,
                }
            })
            .buffered(self.config.insert_concurrency.max(1))
            .collect()
            .await;

        let summary = BatchSummary::from(annotated.as_slice());
        info!(
            total = annotated.len(),
            stored = stored.len(),
            inserted = summary.inserted,
            known = summary.known,
            batch_duplicates = summary.batch_duplicates,
            failed = summary.failed,
            "Deduplicated log batch"
        );

        Ok(annotated)
    }

    /// Decides each record's fate against the snapshot.
    ///
    /// `None` means the record is new and still has to be written.
    fn judge(
        &self,
        records: Vec<LogRecord>,
        stored: &HashSet<Fingerprint>,
    ) -> Vec<(LogRecord, Fingerprint, Option<InsertOutcome>)> {
        let mut seen_in_batch = HashSet::new();
        let mut judged = Vec::with_capacity(records.len());

        for record in records {
            let fp = fingerprint(&record);
            let settled = if stored.contains(&fp) {
                Some(InsertOutcome::AlreadyExists)
            } else if self.config.dedupe_within_batch && !seen_in_batch.insert(fp.clone()) {
                Some(InsertOutcome::DuplicateInBatch)
            } else {
                None
            };
            judged.push((record, fp, settled));
        }

        judged
    }
}

/// Per-outcome counts for one deduplicated batch.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub inserted: usize,
    pub known: usize,
    pub batch_duplicates: usize,
    pub failed: usize,
}

impl From<&[AnnotatedLog]> for BatchSummary {
    fn from(logs: &[AnnotatedLog]) -> Self {
        let mut summary = BatchSummary::default();
        for log in logs {
            match log.outcome {
                InsertOutcome::Inserted => summary.inserted += 1,
                InsertOutcome::AlreadyExists => summary.known += 1,
                InsertOutcome::DuplicateInBatch => summary.batch_duplicates += 1,
                InsertOutcome::PersistenceFailed(_) => summary.failed += 1,
            }
        }
        summary
    }
}
