//! This module handles the initial setup of the application.
use super::args::AppArgs;
use crate::analyzer::LogAnalyzer;
use crate::dedup::{DedupConfig, Deduplicator};
use crate::notify::{DisabledNotifier, Notifier, WebhookNotifier};
use crate::report::{ChatCompletionConfig, ChatCompletionSummarizer};
use crate::storage::{HistoryStore, SledHistoryStore, TableCredentials, TableHistoryStore};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Contains all the components the server needs to run.
pub struct PreparedApp {
    /// The command-line arguments.
    pub args: AppArgs,
    /// The request pipeline shared by all requests.
    pub analyzer: Arc<LogAnalyzer>,
}

/// Where the log history lives.
#[derive(Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// Remote table service, reached with an account name and key.
    Table { account_name: String, account_key: String },
    /// Embedded `sled` database under the data directory.
    Local,
}

impl StoreBackend {
    /// Picks the backend from the storage account options.
    ///
    /// # Errors
    ///
    /// Returns an error if only one of account name and key is given.
    pub fn from_args(args: &AppArgs) -> Result<Self> {
        match (&args.storage_account_name, &args.storage_account_key) {
            (Some(name), Some(key)) => Ok(StoreBackend::Table {
                account_name: name.clone(),
                account_key: key.clone(),
            }),
            (None, None) => Ok(StoreBackend::Local),
            _ => bail!("--storage-account-name and --storage-account-key must be given together"),
        }
    }
}

/// Prepares the application for running.
///
/// This function performs the following steps:
/// 1. Configures logging.
/// 2. Builds the shared HTTP client.
/// 3. Opens the history store.
/// 4. Wires the deduplicator, summarizer and notifier into the pipeline.
///
/// # Errors
///
/// This function will return an error if any of the setup steps fail.
pub fn prepare(args: AppArgs) -> Result<PreparedApp> {
    configure_logging(&args.log_filter);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.http_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let store = open_store(&args, client.clone())?;

    let dedup = Deduplicator::new(
        store,
        DedupConfig {
            insert_concurrency: usize::from(args.insert_concurrency),
            dedupe_within_batch: args.dedupe_within_batch,
        },
    );

    let summarizer = Arc::new(ChatCompletionSummarizer::new(
        client.clone(),
        ChatCompletionConfig {
            endpoint: args.openai_endpoint.clone(),
            deployment: args.openai_deployment.clone(),
            api_key: args.openai_api_key.clone(),
            api_version: args.openai_api_version.clone(),
            max_tokens: args.max_tokens,
            temperature: args.temperature,
            top_p: args.top_p,
        },
    ));

    let notifier: Arc<dyn Notifier + Send + Sync> = match &args.webhook_url {
        Some(url) => {
            info!("Reports will be relayed to the configured webhook");
            Arc::new(WebhookNotifier::new(client, url, &args.webhook_title))
        }
        None => Arc::new(DisabledNotifier),
    };

    let analyzer = Arc::new(LogAnalyzer::new(dedup, summarizer, notifier));

    Ok(PreparedApp { args, analyzer })
}

/// Configures logging for the application.
fn configure_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Opens the history store selected by the arguments.
fn open_store(
    args: &AppArgs,
    client: reqwest::Client,
) -> Result<Arc<dyn HistoryStore + Send + Sync>> {
    match StoreBackend::from_args(args)? {
        StoreBackend::Table {
            account_name,
            account_key,
        } => {
            let credentials = TableCredentials::new(&account_name, &account_key)
                .context("Invalid storage account credentials")?;
            info!(
                account = %account_name,
                table = %args.table_name,
                "Using table storage for log history"
            );
            Ok(Arc::new(TableHistoryStore::new(
                client,
                credentials,
                &args.table_name,
                args.table_endpoint.as_deref(),
            )))
        }
        StoreBackend::Local => {
            std::fs::create_dir_all(&args.data_dir)
                .with_context(|| format!("Failed to create data directory '{}'", args.data_dir))?;
            let db_path = format!("{}/db", args.data_dir);
            let db = sled::open(&db_path)
                .with_context(|| format!("Failed to open database at '{}'", db_path))?;
            info!(path = %db_path, table = %args.table_name, "Using embedded log history");
            Ok(Arc::new(SledHistoryStore::new(db, &args.table_name)?))
        }
    }
}
