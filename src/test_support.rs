//! Fakes shared by the unit tests.
use crate::error::{NotifyError, ReportError, StoreError, StoreResult};
use crate::notify::Notifier;
use crate::report::Summarizer;
use crate::storage::history::{new_entity, HistoryStore};
use crate::types::{AnnotatedLog, Fingerprint, LogRecord, StoredLogEntity};
use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn record(value: Value) -> LogRecord {
    LogRecord::from_value(value).expect("test records are JSON objects")
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// In-memory `HistoryStore` with switchable failures.
#[derive(Default)]
pub struct MemoryHistoryStore {
    fingerprints: Mutex<HashSet<Fingerprint>>,
    inserted: Mutex<Vec<StoredLogEntity>>,
    failing_messages: HashSet<String>,
    fail_listing: bool,
    insert_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryHistoryStore {
    pub fn with_fingerprints(fingerprints: impl IntoIterator<Item = Fingerprint>) -> Self {
        Self {
            fingerprints: Mutex::new(fingerprints.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Makes inserts fail for records whose `message` equals `message`.
    pub fn failing_for_message(mut self, message: &str) -> Self {
        self.failing_messages.insert(message.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    pub fn inserted(&self) -> Vec<StoredLogEntity> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn list_all_fingerprints(&self) -> StoreResult<HashSet<Fingerprint>> {
        if self.fail_listing {
            return Err(StoreError::Service("503: table unavailable".into()));
        }
        Ok(self.fingerprints.lock().unwrap().clone())
    }

    async fn insert(
        &self,
        record: &LogRecord,
        fingerprint: &Fingerprint,
    ) -> StoreResult<StoredLogEntity> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_messages.contains(&record.text_field("message")) {
            return Err(StoreError::Service("409: EntityAlreadyExists".into()));
        }

        let entity = new_entity(record, fingerprint, Utc::now());
        self.fingerprints.lock().unwrap().insert(fingerprint.clone());
        self.inserted.lock().unwrap().push(entity.clone());
        Ok(entity)
    }
}

/// `Summarizer` returning a canned reply and recording every batch it saw.
pub struct ScriptedSummarizer {
    reply: Result<Option<String>, String>,
    batches: Mutex<Vec<Value>>,
}

impl ScriptedSummarizer {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(Some(text.to_string())),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self {
            reply: Ok(None),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// The annotated batches received so far, as JSON.
    pub fn batches(&self) -> Vec<Value> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(&self, logs: &[AnnotatedLog]) -> Result<Option<String>, ReportError> {
        self.batches.lock().unwrap().push(serde_json::to_value(logs)?);
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(message) => Err(ReportError::Api(message.clone())),
        }
    }
}

/// `Notifier` recording every delivered text.
#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(NotifyError::Rejected("400: bad webhook".into()));
        }
        Ok(())
    }
}
