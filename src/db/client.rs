use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;


pub type Row = Map<String, Value>;


#[derive(Debug, Error)]
pub enum Neo4jClientError {
    #[error("Invalid Neo4j URI '{0}'")]
    InvalidUri(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Cypher error {code}: {message}")]
    Cypher { code: String, message: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}


#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    statement: String,
    parameters: Value,
    #[serde(rename = "resultDataContents")]
    result_data_contents: [&'static str; 1],
}

impl Statement {

    pub fn new(cypher: impl Into<String>) -> Self {
        Self::with_params(cypher, Value::Object(Map::new()))
    }


    pub fn with_params(cypher: impl Into<String>, parameters: Value) -> Self {
        Self {
            statement: cypher.into(),
            parameters,
            result_data_contents: ["row"],
        }
    }
}


#[derive(Serialize)]
struct TxRequest<'a> {
    statements: &'a [Statement],
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Deserialize)]
struct TxResult {
    columns: Vec<String>,
    data: Vec<TxRow>,
}

#[derive(Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Deserialize)]
struct TxError {
    code: String,
    message: String,
}


/// Map a driver-style URI onto the Neo4j HTTP endpoint.
///
/// `bolt://` and `neo4j://` go to plain HTTP on 7474, their `+s`/`+ssc`
/// variants to HTTPS on 7473. HTTP(S) URIs pass through unchanged.
pub fn http_endpoint(uri: &str) -> Result<Url, Neo4jClientError> {
    let parsed = Url::parse(uri).map_err(|_| Neo4jClientError::InvalidUri(uri.to_string()))?;

    let (scheme, default_port) = match parsed.scheme() {
        "http" | "https" => return Ok(parsed),
        "bolt" | "neo4j" => ("http", 7474),
        "bolt+s" | "bolt+ssc" | "neo4j+s" | "neo4j+ssc" => ("https", 7473),
        _ => return Err(Neo4jClientError::InvalidUri(uri.to_string())),
    };

    let host = parsed
        .host_str()
        .ok_or_else(|| Neo4jClientError::InvalidUri(uri.to_string()))?;
    let port = match parsed.port() {
        Some(7687) | None => default_port,
        Some(other) => other,
    };

    Url::parse(&format!("{scheme}://{host}:{port}"))
        .map_err(|_| Neo4jClientError::InvalidUri(uri.to_string()))
}


pub struct Neo4jClient {
    client: Client,
    commit_url: String,
    user: String,
    password: String,
    base_url: String,
}

impl Neo4jClient {

    pub fn new(
        uri: &str,
        user: &str,
        password: &str,
        database: &str,
        timeout_secs: u64,
    ) -> Result<Self, Neo4jClientError> {
        let endpoint = http_endpoint(uri)?;
        let base_url = endpoint.as_str().trim_end_matches('/').to_string();
        let commit_url = format!("{}/db/{}/tx/commit", base_url, database);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        info!("Neo4jClient created for {} (database={})", base_url, database);

        Ok(Self {
            client,
            commit_url,
            user: user.to_string(),
            password: password.to_string(),
            base_url,
        })
    }


    pub async fn run(&self, statement: Statement) -> Result<Vec<Row>, Neo4jClientError> {
        let mut results = self.run_in_transaction(vec![statement]).await?;
        results
            .pop()
            .ok_or_else(|| Neo4jClientError::UnexpectedResponse("no result set returned".to_string()))
    }

    /// Execute all statements in one implicit transaction: either every
    /// statement commits or none does.
    pub async fn run_in_transaction(
        &self,
        statements: Vec<Statement>,
    ) -> Result<Vec<Vec<Row>>, Neo4jClientError> {
        debug!("Committing {} statement(s) to {}", statements.len(), self.commit_url);

        let response = self
            .client
            .post(&self.commit_url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&TxRequest {
                statements: &statements,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<TxResponse>()
            .await?;

        if let Some(err) = response.errors.into_iter().next() {
            return Err(Neo4jClientError::Cypher {
                code: err.code,
                message: err.message,
            });
        }

        Ok(response
            .results
            .into_iter()
            .map(|result| {
                result
                    .data
                    .into_iter()
                    .map(|data| {
                        result
                            .columns
                            .iter()
                            .cloned()
                            .zip(data.row)
                            .collect::<Row>()
                    })
                    .collect()
            })
            .collect())
    }


    pub async fn health_check(&self) -> Result<(), Neo4jClientError> {
        self.run(Statement::new("RETURN 1 AS ok")).await.map(|_| ())
    }


    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
