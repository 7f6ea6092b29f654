use tracing::{error, info};

use crate::core::config::ProbeSettings;
use crate::db::{DocumentStore, SupabaseClient};


/// One bounded read against `table`. Prints what it finds; any failure is
/// reported and turned into `false`.
pub async fn check_connection(store: &dyn DocumentStore, table: &str) -> bool {
    match store.sample(table, 1).await {
        Ok(sample) => {
            match sample.total {
                Some(total) => println!("Connected: '{table}' holds {total} row(s)"),
                None => println!("Connected: '{table}' row count unavailable"),
            }
            match sample.rows.first() {
                Some(row) => println!("Sample row: {row}"),
                None => println!("Sample row: <table is empty>"),
            }
            info!("Supabase probe on '{}' succeeded", table);
            true
        }
        Err(e) => {
            println!("Query on '{table}' failed: {e}");
            error!("Supabase probe on '{}' failed: {}", table, e);
            false
        }
    }
}


/// Check that the configured Supabase project is reachable and readable.
pub async fn test_supabase_connection(settings: &ProbeSettings) -> bool {
    let (Some(url), Some(key)) = (settings.supabase_url.as_deref(), settings.supabase_key.as_deref()) else {
        println!("SUPABASE_URL and SUPABASE_KEY must be set");
        return false;
    };

    println!("Connecting to {url}");
    let client = match SupabaseClient::new(url, key, settings.request_timeout_secs) {
        Ok(client) => client,
        Err(e) => {
            println!("Could not create Supabase client: {e}");
            error!("Supabase client construction failed: {}", e);
            return false;
        }
    };

    check_connection(&client, &settings.table).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DocumentStoreError, MatchedDocument, TableSample};
    use async_trait::async_trait;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    fn settings(url: Option<&str>, key: Option<&str>) -> ProbeSettings {
        ProbeSettings {
            supabase_url: url.map(String::from),
            supabase_key: key.map(String::from),
            table: "documents_reranking".to_string(),
            request_timeout_secs: 2,
        }
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn match_documents(
            &self,
            _collection: &str,
            _query_embedding: &[f32],
            _match_count: usize,
        ) -> Result<Vec<MatchedDocument>, DocumentStoreError> {
            Ok(Vec::new())
        }

        async fn sample(&self, table: &str, _limit: usize) -> Result<TableSample, DocumentStoreError> {
            Err(DocumentStoreError::InvalidCollection(table.to_string()))
        }
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        assert!(!test_supabase_connection(&settings(None, Some("key"))).await);
        assert!(!test_supabase_connection(&settings(Some("https://x.supabase.co"), None)).await);
    }

    #[tokio::test]
    async fn test_malformed_url() {
        assert!(!test_supabase_connection(&settings(Some("not a url"), Some("key"))).await);
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        assert!(!test_supabase_connection(&settings(Some("http://127.0.0.1:9"), Some("key"))).await);
    }

    #[tokio::test]
    async fn test_failed_read() {
        assert!(!check_connection(&FailingStore, "documents_reranking").await);
    }

    #[tokio::test]
    async fn test_reachable_table() {
        let router = Router::new().route(
            "/rest/v1/documents_reranking",
            get(|| async { ([("content-range", "0-0/3")], Json(json!([{ "id": 1, "text": "hello" }]))) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let url = format!("http://{addr}");
        assert!(test_supabase_connection(&settings(Some(&url), Some("anon-key"))).await);
    }
}
