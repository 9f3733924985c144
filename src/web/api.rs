//! This module defines the HTTP endpoints of the service.
use crate::analyzer::{AnalysisOutcome, LogAnalyzer};
use crate::error::AnalyzeError;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Response body for a generated report.
#[derive(Serialize)]
pub struct SummaryResponse {
    summary: String,
}

/// Response body when the model produced no report.
#[derive(Serialize)]
pub struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// Deduplicates a submitted log batch and returns the analysis report.
#[axum::debug_handler]
pub async fn analyze_logs(
    State(analyzer): State<Arc<LogAnalyzer>>,
    body: Bytes,
) -> Response {
    match analyzer.analyze(&body).await {
        Ok(AnalysisOutcome::Report(summary)) => {
            (StatusCode::OK, Json(SummaryResponse { summary })).into_response()
        }
        Ok(AnalysisOutcome::NoContent) => (
            StatusCode::NO_CONTENT,
            Json(MessageResponse {
                message: "No analysis result".to_string(),
            }),
        )
            .into_response(),
        Err(AnalyzeError::InvalidPayload(error)) => {
            warn!("Rejected log batch: {}", error);
            (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
