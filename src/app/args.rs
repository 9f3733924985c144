use crate::notify::DEFAULT_TITLE;
use crate::report::DEFAULT_API_VERSION;
use clap::{ArgAction, Parser};
use std::net::SocketAddr;

#[derive(Parser, Debug, Clone)]
#[command(name = "log-triage")]
#[command(about = "Deduplicates client log batches and relays an AI analysis report")]
pub struct AppArgs {
    #[arg(long, env = "LOG_TRIAGE_LISTEN", default_value = "127.0.0.1:7071", help = "Address to listen on")]
    pub listen: SocketAddr,

    #[arg(long, env = "LOG_TRIAGE_DATA_DIR", default_value = "data", help = "Data directory for the embedded history store")]
    pub data_dir: String,

    #[arg(long, env = "AZURE_STORAGE_ACCOUNT_NAME", help = "Table storage account name")]
    pub storage_account_name: Option<String>,

    #[arg(long, env = "AZURE_STORAGE_ACCOUNT_KEY", hide_env_values = true, help = "Table storage account key (base64)")]
    pub storage_account_key: Option<String>,

    #[arg(long, env = "AZURE_TABLE_NAME", default_value = "LogHistory", help = "Table holding the log history")]
    pub table_name: String,

    #[arg(long, env = "AZURE_TABLE_ENDPOINT", help = "Override of the table service endpoint")]
    pub table_endpoint: Option<String>,

    #[arg(long, env = "OPENAI_ENDPOINT", help = "Chat completion service endpoint")]
    pub openai_endpoint: String,

    #[arg(long, env = "OPENAI_DEPLOYMENT", help = "Model deployment name")]
    pub openai_deployment: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, help = "Chat completion API key")]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_API_VERSION", default_value = DEFAULT_API_VERSION)]
    pub openai_api_version: String,

    #[arg(long, default_value_t = 9192)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    #[arg(long, default_value_t = 1.0)]
    pub top_p: f32,

    #[arg(long, env = "TEAMS_WEBHOOK_URL", help = "Webhook receiving the report (disabled if unset)")]
    pub webhook_url: Option<String>,

    #[arg(long, env = "LOG_TRIAGE_WEBHOOK_TITLE", default_value = DEFAULT_TITLE)]
    pub webhook_title: String,

    #[arg(long, env = "LOG_TRIAGE_INSERT_CONCURRENCY", default_value_t = 16, value_parser = clap::value_parser!(u16).range(1..))]
    pub insert_concurrency: u16,

    #[arg(
        long,
        env = "LOG_TRIAGE_DEDUPE_WITHIN_BATCH",
        default_value_t = true,
        action = ArgAction::Set,
        help = "Collapse identical records inside one batch"
    )]
    pub dedupe_within_batch: bool,

    #[arg(long, env = "LOG_TRIAGE_HTTP_TIMEOUT_SECS", default_value_t = 120)]
    pub http_timeout_secs: u64,

    #[arg(long, env = "LOG_TRIAGE_MAX_BODY_BYTES", default_value_t = 8 * 1024 * 1024)]
    pub max_body_bytes: usize,

    #[arg(long, env = "RUST_LOG", default_value = "info,log_triage=debug")]
    pub log_filter: String,
}

impl AppArgs {
    pub fn from_cli() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 7] = [
        "log-triage",
        "--openai-endpoint",
        "https://models.example",
        "--openai-deployment",
        "triage",
        "--openai-api-key",
        "k",
    ];

    #[test]
    fn defaults_match_documented_values() {
        let args = AppArgs::try_parse_from(REQUIRED).unwrap();
        assert_eq!(args.table_name, "LogHistory");
        assert_eq!(args.openai_api_version, "2024-05-01-preview");
        assert_eq!(args.max_tokens, 9192);
        assert_eq!(args.insert_concurrency, 16);
        assert!(args.dedupe_within_batch);
        assert!(args.webhook_url.is_none());
    }

    #[test]
    fn in_batch_dedupe_can_be_disabled() {
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--dedupe-within-batch", "false"]);
        let args = AppArgs::try_parse_from(argv).unwrap();
        assert!(!args.dedupe_within_batch);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--insert-concurrency", "0"]);
        assert!(AppArgs::try_parse_from(argv).is_err());
    }
}
