//! The request pipeline: validate a submitted batch, deduplicate it, request a
//! report and relay it.
//!
//! A request moves through `Received → Validated → Deduplicated → Reported →
//! Notified → Responded`; any step may end it with an `AnalyzeError`.
use crate::dedup::Deduplicator;
use crate::error::AnalyzeError;
use crate::notify::Notifier;
use crate::report::Summarizer;
use crate::types::LogRecord;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Deduplicated,
    Reported,
    Notified,
    Responded,
}

/// Successful end states of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// The report text; it has been handed to the notifier.
    Report(String),
    /// The summarizer answered without any text. Nothing was relayed.
    NoContent,
}

pub struct LogAnalyzer {
    dedup: Deduplicator,
    summarizer: Arc<dyn Summarizer + Send + Sync>,
    notifier: Arc<dyn Notifier + Send + Sync>,
}

impl LogAnalyzer {
    pub fn new(
        dedup: Deduplicator,
        summarizer: Arc<dyn Summarizer + Send + Sync>,
        notifier: Arc<dyn Notifier + Send + Sync>,
    ) -> Self {
        Self {
            dedup,
            summarizer,
            notifier,
        }
    }

    /// Runs the whole pipeline for a raw request body.
    pub async fn analyze(&self, body: &[u8]) -> Result<AnalysisOutcome, AnalyzeError> {
        debug!(stage = ?Stage::Received, bytes = body.len());
        let records = parse_batch(body)?;
        debug!(stage = ?Stage::Validated, records = records.len());
        self.analyze_records(records).await
    }

    /// Runs the pipeline for an already validated batch.
    pub async fn analyze_records(
        &self,
        records: Vec<LogRecord>,
    ) -> Result<AnalysisOutcome, AnalyzeError> {
        let annotated = self.dedup.deduplicate(records).await?;
        debug!(stage = ?Stage::Deduplicated, records = annotated.len());

        let report = match self.summarizer.summarize(&annotated).await {
            Ok(Some(report)) => report,
            Ok(None) => {
                warn!("Summarizer answered without a report");
                return Ok(AnalysisOutcome::NoContent);
            }
            Err(e) => {
                error!("Report generation failed: {}", e);
                return Err(e.into());
            }
        };
        debug!(stage = ?Stage::Reported, chars = report.chars().count());

        match self.notifier.notify(&report).await {
            Ok(()) => debug!(stage = ?Stage::Notified),
            Err(e) => error!("Failed to relay report: {}", e),
        }

        info!(stage = ?Stage::Responded, "Log batch analysed");
        Ok(AnalysisOutcome::Report(report))
    }
}

/// Validates a request body and extracts its log records.
///
/// The body must be a JSON object whose `logs` field is an array of JSON
/// objects.
pub fn parse_batch(body: &[u8]) -> Result<Vec<LogRecord>, AnalyzeError> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| AnalyzeError::InvalidPayload(format!("request body is not valid JSON: {}", e)))?;

    let logs = match payload {
        Value::Object(mut fields) => match fields.remove("logs") {
            Some(Value::Array(logs)) => logs,
            _ => {
                return Err(AnalyzeError::InvalidPayload(
                    "the logs field is missing or is not an array".to_string(),
                ))
            }
        },
        _ => {
            return Err(AnalyzeError::InvalidPayload(
                "request body must be a JSON object".to_string(),
            ))
        }
    };

    logs.into_iter()
        .enumerate()
        .map(|(idx, value)| {
            LogRecord::from_value(value).ok_or_else(|| {
                AnalyzeError::InvalidPayload(format!("logs[{}] is not a JSON object", idx))
            })
        })
        .collect()
}
