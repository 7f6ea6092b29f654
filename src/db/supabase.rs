use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;


#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("Invalid backend URL '{0}'")]
    InvalidUrl(String),
    #[error("Invalid API key: {0}")]
    InvalidKey(String),
    #[error("Invalid collection name '{0}'")]
    InvalidCollection(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}


/// A row returned by the `match_<collection>` procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedDocument {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}


#[derive(Debug, Clone, Default)]
pub struct TableSample {
    pub total: Option<u64>,
    pub rows: Vec<Value>,
}


/// Vector-search backend holding the document collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn match_documents(
        &self,
        collection: &str,
        query_embedding: &[f32],
        match_count: usize,
    ) -> Result<Vec<MatchedDocument>, DocumentStoreError>;

    /// Bounded read used for connectivity checks.
    async fn sample(&self, table: &str, limit: usize) -> Result<TableSample, DocumentStoreError>;
}


pub fn rpc_function_for(collection: &str) -> String {
    format!("match_{collection}")
}


fn validate_identifier(name: &str) -> Result<(), DocumentStoreError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DocumentStoreError::InvalidCollection(name.to_string()))
    }
}


/// Parse the row total out of a PostgREST `Content-Range` header (`0-0/42`, `*/0`).
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}


#[derive(Serialize)]
struct MatchDocumentsParams<'a> {
    query_embedding: &'a [f32],
    match_count: usize,
}


pub struct SupabaseClient {
    client: Client,
    rest_url: String,
}

impl SupabaseClient {

    pub fn new(url: &str, key: &str, timeout_secs: u64) -> Result<Self, DocumentStoreError> {
        let parsed = Url::parse(url).map_err(|_| DocumentStoreError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DocumentStoreError::InvalidUrl(url.to_string()));
        }

        let mut headers = HeaderMap::new();
        let api_key =
            HeaderValue::from_str(key).map_err(|e| DocumentStoreError::InvalidKey(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| DocumentStoreError::InvalidKey(e.to_string()))?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()?;

        let rest_url = format!("{}/rest/v1", parsed.as_str().trim_end_matches('/'));
        info!("SupabaseClient created for {}", rest_url);

        Ok(Self { client, rest_url })
    }
}

#[async_trait]
impl DocumentStore for SupabaseClient {
    async fn match_documents(
        &self,
        collection: &str,
        query_embedding: &[f32],
        match_count: usize,
    ) -> Result<Vec<MatchedDocument>, DocumentStoreError> {
        validate_identifier(collection)?;
        let function = rpc_function_for(collection);
        debug!("RPC {} (match_count={})", function, match_count);

        let rows = self
            .client
            .post(format!("{}/rpc/{}", self.rest_url, function))
            .json(&MatchDocumentsParams {
                query_embedding,
                match_count,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<MatchedDocument>>()
            .await?;

        Ok(rows)
    }

    async fn sample(&self, table: &str, limit: usize) -> Result<TableSample, DocumentStoreError> {
        validate_identifier(table)?;

        let response = self
            .client
            .get(format!("{}/{}", self.rest_url, table))
            .query(&[("select", "*".to_string()), ("limit", limit.to_string())])
            .header("Prefer", "count=exact")
            .send()
            .await?
            .error_for_status()?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        let rows = response.json::<Vec<Value>>().await?;

        Ok(TableSample { total, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::HeaderMap as AxumHeaders,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_rpc_function_name() {
        assert_eq!(rpc_function_for("documents_reranking"), "match_documents_reranking");
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total("0-0/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-0/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(matches!(
            SupabaseClient::new("not a url", "key", 5),
            Err(DocumentStoreError::InvalidUrl(_))
        ));
        assert!(matches!(
            SupabaseClient::new("ftp://example.com", "key", 5),
            Err(DocumentStoreError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_like_collection() {
        let client = SupabaseClient::new("http://127.0.0.1:9", "key", 1).unwrap();
        let result = client.match_documents("../users", &[0.1], 5).await;
        assert!(matches!(result, Err(DocumentStoreError::InvalidCollection(_))));
    }

    #[tokio::test]
    async fn test_match_documents_wire_format() {
        let router = Router::new().route(
            "/rest/v1/rpc/match_documents_reranking",
            post(|headers: AxumHeaders, Json(body): Json<Value>| async move {
                assert_eq!(headers.get("apikey").unwrap(), "anon-key");
                assert_eq!(headers.get("authorization").unwrap(), "Bearer anon-key");
                assert_eq!(body["match_count"], 2);
                assert_eq!(body["query_embedding"].as_array().unwrap().len(), 3);
                Json(json!([
                    { "id": 1, "text": "first", "similarity": 0.91 },
                    { "id": 2, "text": "second", "similarity": 0.87 }
                ]))
            }),
        );
        let base = spawn_stub(router).await;
        let client = SupabaseClient::new(&base, "anon-key", 5).unwrap();

        let docs = client
            .match_documents("documents_reranking", &[0.1, 0.2, 0.3], 2)
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "first");
        assert_eq!(docs[1].similarity, Some(0.87));
    }

    #[tokio::test]
    async fn test_sample_reads_count() {
        let router = Router::new().route(
            "/rest/v1/documents_reranking",
            get(|headers: AxumHeaders, Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(headers.get("prefer").unwrap(), "count=exact");
                assert_eq!(params.get("limit").map(String::as_str), Some("1"));
                (
                    [("content-range", "0-0/128")],
                    Json(json!([{ "id": 1, "text": "hello" }])),
                )
            }),
        );
        let base = spawn_stub(router).await;
        let client = SupabaseClient::new(&base, "anon-key", 5).unwrap();

        let sample = client.sample("documents_reranking", 1).await.unwrap();
        assert_eq!(sample.total, Some(128));
        assert_eq!(sample.rows.len(), 1);
    }
}
