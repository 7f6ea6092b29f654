use thiserror::Error;

use crate::db::{DocumentStoreError, Neo4jClientError};
use crate::graph::{FixtureError, GraphError};
use crate::llm::cross_encoder::ScoringError;
use crate::llm::embeddings::EmbeddingError;


#[derive(Error, Debug)]
pub enum KgError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Graph store error: {0}")]
    Graph(#[from] GraphError),

    #[error("Neo4j error: {0}")]
    Neo4j(#[from] Neo4jClientError),

    #[error("Document store error: {0}")]
    DocumentStore(#[from] DocumentStoreError),

    #[error("Embedding generation error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Fixture error: {0}")]
    Fixture(#[from] FixtureError),
}

impl From<config::ConfigError> for KgError {
    fn from(e: config::ConfigError) -> Self {
        KgError::Config(e.to_string())
    }
}


pub type Result<T> = std::result::Result<T, KgError>;
