//! History store backed by a remote table service (Azure Table Storage REST
//! API), authenticated with an account name and shared key.
use super::history::{new_entity, FingerprintOnly, HistoryStore};
use crate::error::{StoreError, StoreResult};
use crate::types::{Fingerprint, LogRecord, StoredLogEntity};
use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashSet;
use tracing::debug;

const API_VERSION: &str = "2019-02-02";
const ODATA_NO_METADATA: &str = "application/json;odata=nometadata";
const NEXT_PARTITION_KEY: &str = "x-ms-continuation-nextpartitionkey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-nextrowkey";

/// Account name and decoded shared key used to sign table requests.
#[derive(Clone)]
pub struct TableCredentials {
    account_name: String,
    account_key: Vec<u8>,
}

impl TableCredentials {
    /// Creates credentials from an account name and its base64 account key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid base64.
    pub fn new(account_name: &str, account_key: &str) -> StoreResult<Self> {
        let account_key = BASE64_STANDARD
            .decode(account_key.trim())
            .map_err(|e| StoreError::Credentials(format!("account key is not base64: {}", e)))?;
        Ok(Self {
            account_name: account_name.to_string(),
            account_key,
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Computes the `SharedKeyLite` authorization header value.
    ///
    /// The string to sign is the request date followed by the canonical
    /// resource `/{account}{path}`.
    fn authorization(&self, date: &str, path: &str) -> StoreResult<String> {
        let string_to_sign = format!("{}\n/{}{}", date, self.account_name, path);
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.account_key)
            .map_err(|e| StoreError::Credentials(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKeyLite {}:{}", self.account_name, signature))
    }
}

#[derive(Deserialize)]
struct QueryPage {
    #[serde(default)]
    value: Vec<FingerprintOnly>,
}

/// A `HistoryStore` implementation talking to a remote table service.
pub struct TableHistoryStore {
    client: Client,
    endpoint: String,
    table_name: String,
    credentials: TableCredentials,
}

impl TableHistoryStore {
    /// Creates a new `TableHistoryStore`.
    ///
    /// # Arguments
    ///
    /// * `client` - The shared HTTP client.
    /// * `credentials` - The account credentials.
    /// * `table_name` - The table holding the log history.
    /// * `endpoint` - Optional service endpoint; defaults to the public
    ///   endpoint of the account.
    pub fn new(
        client: Client,
        credentials: TableCredentials,
        table_name: &str,
        endpoint: Option<&str>,
    ) -> Self {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.table.core.windows.net",
                credentials.account_name()
            ),
        };
        Self {
            client,
            endpoint,
            table_name: table_name.to_string(),
            credentials,
        }
    }

    fn url(&self, resource: &str) -> StoreResult<Url> {
        Url::parse(&format!("{}/{}", self.endpoint, resource))
            .map_err(|e| StoreError::Service(format!("invalid table endpoint: {}", e)))
    }

    fn signed_headers(&self, url: &Url, now: DateTime<Utc>) -> StoreResult<HeaderMap> {
        let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let authorization = self.credentials.authorization(&date, url.path())?;

        let mut headers = HeaderMap::new();
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));
        headers.insert("dataserviceversion", HeaderValue::from_static("3.0;NetFx"));
        headers.insert(ACCEPT, HeaderValue::from_static(ODATA_NO_METADATA));
        headers.insert("x-ms-date", header_value(&date)?);
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(headers)
    }

    async fn fetch_page(
        &self,
        continuation: Option<&(String, String)>,
    ) -> StoreResult<(Vec<FingerprintOnly>, Option<(String, String)>)> {
        let mut url = self.url(&format!("{}()", self.table_name))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("$select", "logHash");
            if let Some((partition, row)) = continuation {
                query.append_pair("NextPartitionKey", partition);
                query.append_pair("NextRowKey", row);
            }
        }

        let headers = self.signed_headers(&url, Utc::now())?;
        let response = check_status(self.client.get(url).headers(headers).send().await?).await?;

        let next = continuation_from(response.headers());
        let page = response.json::<QueryPage>().await?;
        Ok((page.value, next))
    }
}

#[async_trait]
impl HistoryStore for TableHistoryStore {
    async fn list_all_fingerprints(&self) -> StoreResult<HashSet<Fingerprint>> {
        let mut fingerprints = HashSet::new();
        let mut continuation = None;
        let mut pages = 0usize;

        loop {
            let (items, next) = self.fetch_page(continuation.as_ref()).await?;
            pages += 1;
            fingerprints.extend(items.into_iter().filter_map(|item| item.log_hash));

            match next {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }

        debug!(
            pages,
            fingerprints = fingerprints.len(),
            table = %self.table_name,
            "Loaded stored fingerprints"
        );
        Ok(fingerprints)
    }

    async fn insert(
        &self,
        record: &LogRecord,
        fingerprint: &Fingerprint,
    ) -> StoreResult<StoredLogEntity> {
        let entity = new_entity(record, fingerprint, Utc::now());
        let url = self.url(&self.table_name)?;

        let mut headers = self.signed_headers(&url, Utc::now())?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("prefer", HeaderValue::from_static("return-no-content"));

        check_status(
            self.client
                .post(url)
                .headers(headers)
                .json(&entity)
                .send()
                .await?,
        )
        .await?;

        Ok(entity)
    }
}

fn header_value(value: &str) -> StoreResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| StoreError::Service(e.to_string()))
}

async fn check_status(response: Response) -> StoreResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Service(format!("{status}: {body}")))
}

fn continuation_from(headers: &HeaderMap) -> Option<(String, String)> {
    let partition = headers.get(NEXT_PARTITION_KEY)?.to_str().ok()?;
    let row = headers
        .get(NEXT_ROW_KEY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Some((partition.to_string(), row.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::test_support::spawn_server;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const KEY: &str = "c3VwZXItc2VjcmV0LWFjY291bnQta2V5";

    #[derive(Default)]
    struct FakeTable {
        inserted: Mutex<Vec<Value>>,
        auth_headers: Mutex<Vec<String>>,
    }

    fn record_auth(table: &FakeTable, headers: &AxumHeaders) {
        if let Some(auth) = headers.get("authorization") {
            table
                .auth_headers
                .lock()
                .unwrap()
                .push(auth.to_str().unwrap().to_string());
        }
    }

    async fn query(
        State(table): State<Arc<FakeTable>>,
        headers: AxumHeaders,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        record_auth(&table, &headers);
        assert_eq!(params.get("$select").map(String::as_str), Some("logHash"));

        match params.get("NextPartitionKey").map(String::as_str) {
            None => (
                [
                    (NEXT_PARTITION_KEY, "2024-01-02"),
                    (NEXT_ROW_KEY, "row-2"),
                ],
                Json(json!({"value": [{"logHash": "aaa"}, {}]})),
            )
                .into_response(),
            Some("2024-01-02") => {
                assert_eq!(params.get("NextRowKey").map(String::as_str), Some("row-2"));
                Json(json!({"value": [{"logHash": "bbb"}, {"logHash": "aaa"}]})).into_response()
            }
            Some(other) => panic!("unexpected continuation {other}"),
        }
    }

    async fn insert(
        State(table): State<Arc<FakeTable>>,
        headers: AxumHeaders,
        Json(body): Json<Value>,
    ) -> StatusCode {
        record_auth(&table, &headers);
        table.inserted.lock().unwrap().push(body);
        StatusCode::NO_CONTENT
    }

    async fn fake_table() -> (Arc<FakeTable>, String) {
        let table = Arc::new(FakeTable::default());
        let router = Router::new()
            .route("/LogHistory()", get(query))
            .route("/LogHistory", post(insert))
            .with_state(table.clone());
        (table, spawn_server(router).await)
    }

    fn store(endpoint: &str) -> TableHistoryStore {
        let credentials = TableCredentials::new("acct", KEY).unwrap();
        TableHistoryStore::new(Client::new(), credentials, "LogHistory", Some(endpoint))
    }

    #[test]
    fn signs_date_and_canonical_resource() {
        let credentials = TableCredentials::new("acct", KEY).unwrap();
        let auth = credentials
            .authorization("Tue, 01 Oct 2024 10:00:00 GMT", "/LogHistory()")
            .unwrap();
        assert_eq!(
            auth,
            "SharedKeyLite acct:UcpxPur/KaC3G74G7EVllHcAcJfDgHW5CkYB8NHDAYA="
        );
    }

    #[test]
    fn rejects_non_base64_keys() {
        assert!(matches!(
            TableCredentials::new("acct", "not base64!"),
            Err(StoreError::Credentials(_))
        ));
    }

    #[test]
    fn default_endpoint_uses_account_name() {
        let credentials = TableCredentials::new("myacct", KEY).unwrap();
        let store = TableHistoryStore::new(Client::new(), credentials, "LogHistory", None);
        assert_eq!(store.endpoint, "https://myacct.table.core.windows.net");
    }

    #[tokio::test]
    async fn lists_fingerprints_across_continuations() {
        let (table, endpoint) = fake_table().await;

        let listed = store(&endpoint).list_all_fingerprints().await.unwrap();

        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&Fingerprint::from_hex("aaa")));
        assert!(listed.contains(&Fingerprint::from_hex("bbb")));
        let auth = table.auth_headers.lock().unwrap();
        assert_eq!(auth.len(), 2);
        assert!(auth.iter().all(|a| a.starts_with("SharedKeyLite acct:")));
    }

    #[tokio::test]
    async fn insert_posts_entity() {
        let (table, endpoint) = fake_table().await;
        let rec = LogRecord::from_value(json!({"message": "boom", "level": "error"})).unwrap();
        let fp = fingerprint(&rec);

        let entity = store(&endpoint).insert(&rec, &fp).await.unwrap();

        let inserted = table.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0]["PartitionKey"], json!(entity.partition_key));
        assert_eq!(inserted[0]["RowKey"], json!(entity.row_key));
        assert_eq!(inserted[0]["logHash"], json!(fp.as_str()));
        assert_eq!(inserted[0]["isNew"], json!(true));
        assert_eq!(inserted[0]["message"], json!("boom"));
    }

    #[tokio::test]
    async fn service_errors_are_reported() {
        let router = Router::new().route(
            "/LogHistory()",
            get(|| async { (StatusCode::FORBIDDEN, "AuthenticationFailed") }),
        );
        let endpoint = spawn_server(router).await;

        let err = store(&endpoint).list_all_fingerprints().await.unwrap_err();
        match err {
            StoreError::Service(message) => assert!(message.contains("403")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
