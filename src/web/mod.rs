mod api;

use crate::analyzer::LogAnalyzer;
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const ANALYZE_ROUTE: &str = "/api/logger_analyze";

pub fn router(analyzer: Arc<LogAnalyzer>, max_body_bytes: usize) -> Router {
    Router::new()
        .route(ANALYZE_ROUTE, post(api::analyze_logs))
        .route("/health", get(api::health))
        .with_state(analyzer)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

pub async fn start_server(
    analyzer: Arc<LogAnalyzer>,
    addr: SocketAddr,
    max_body_bytes: usize,
) -> Result<()> {
    let app = router(analyzer, max_body_bytes);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Log triage service listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
