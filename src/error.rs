use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The table service answered with a non-success status.
    #[error("Table service error: {0}")]
    Service(String),

    #[error("Invalid credentials: {0}")]
    Credentials(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook rejected the message: {0}")]
    Rejected(String),
}

/// Failures that end a request before a report is returned.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("{0}")]
    InvalidPayload(String),

    #[error("Failed to read log history: {0}")]
    History(#[from] StoreError),

    #[error("Failed to generate report: {0}")]
    Report(#[from] ReportError),
}
