//! The main entry point for the log-triage service.
mod analyzer;
mod app;
mod dedup;
mod error;
mod fingerprint;
mod notify;
mod report;
mod storage;
#[cfg(test)]
mod test_support;
mod types;
mod web;

use anyhow::Result;

/// The main function of the application.
///
/// Parses the configuration from the command line and environment, then
/// serves the log analysis endpoint until interrupted.
///
/// # Errors
///
/// Returns an error if the service fails to start or the server stops
/// with an error.
#[tokio::main]
async fn main() -> Result<()> {
    app::launch().await
}
