use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::db::{DocumentStore, DocumentStoreError, MatchedDocument};
use crate::llm::cross_encoder::{RelevanceScorer, ScoringError};
use crate::llm::embeddings::{Embedder, EmbeddingError};
use crate::{DEFAULT_COLLECTION, DEFAULT_MATCH_COUNT, DEFAULT_TOP_K};


#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to generate embedding: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("{0}")]
    Search(#[from] DocumentStoreError),

    #[error("{0}")]
    Scoring(#[from] ScoringError),
}


/// Long-lived clients shared by every rerank request.
pub struct RerankContext {
    pub embedder: Arc<dyn Embedder>,
    pub documents: Arc<dyn DocumentStore>,
    pub scorer: Arc<dyn RelevanceScorer>,
}

impl RerankContext {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        documents: Arc<dyn DocumentStore>,
        scorer: Arc<dyn RelevanceScorer>,
    ) -> Self {
        info!(
            "RerankContext ready (embedding={}, reranker={})",
            embedder.model(),
            scorer.model_name()
        );
        Self {
            embedder,
            documents,
            scorer,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankRequest {
    pub query: String,
    pub collection_name: String,
    pub match_count: usize,
    pub top_k: usize,
}

impl RerankRequest {

    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            collection_name: DEFAULT_COLLECTION.to_string(),
            match_count: DEFAULT_MATCH_COUNT,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// `top_k` above `match_count` is accepted; it just yields fewer items.
    pub fn validate(&self) -> Result<(), RerankError> {
        if self.match_count == 0 {
            return Err(RerankError::InvalidRequest("match_count must be positive".to_string()));
        }
        if self.top_k == 0 {
            return Err(RerankError::InvalidRequest("top_k must be positive".to_string()));
        }
        Ok(())
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub text: String,
    pub score: f32,
}


#[derive(Debug, Clone, PartialEq)]
pub enum RerankOutcome {
    NoMatches,
    Ranked(Vec<ScoredDocument>),
}


/// Pair documents with their scores, sort best-first and keep `top_k`.
/// Equal scores keep retrieval order.
pub fn rank_documents(
    documents: Vec<MatchedDocument>,
    scores: Vec<f32>,
    top_k: usize,
) -> Result<Vec<ScoredDocument>, ScoringError> {
    if scores.len() != documents.len() {
        return Err(ScoringError::LengthMismatch {
            expected: documents.len(),
            got: scores.len(),
        });
    }

    let mut ranked: Vec<ScoredDocument> = documents
        .into_iter()
        .zip(scores)
        .map(|(doc, score)| ScoredDocument { text: doc.text, score })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(top_k);
    Ok(ranked)
}


/// Embed the query, fetch `match_count` candidates from the collection,
/// score them with the cross-encoder and return the best `top_k`.
pub async fn search_and_rerank(
    ctx: &RerankContext,
    request: &RerankRequest,
) -> Result<RerankOutcome, RerankError> {
    request.validate()?;
    let preview = crate::safe_truncate(&request.query, 50);

    let embedding = ctx.embedder.embed(&request.query).await.map_err(|e| {
        error!("Failed to generate embedding for '{}': {}", preview, e);
        RerankError::Embedding(e)
    })?;

    let documents = ctx
        .documents
        .match_documents(&request.collection_name, &embedding, request.match_count)
        .await
        .map_err(|e| {
            error!("Vector search on '{}' failed: {}", request.collection_name, e);
            RerankError::Search(e)
        })?;

    if documents.is_empty() {
        info!("No matches in '{}' for '{}'", request.collection_name, preview);
        return Ok(RerankOutcome::NoMatches);
    }
    debug!("Scoring {} candidates for '{}'", documents.len(), preview);

    let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
    let scores = ctx.scorer.score(&request.query, &texts).await.map_err(|e| {
        error!("Cross-encoder scoring failed: {}", e);
        RerankError::Scoring(e)
    })?;

    let ranked = rank_documents(documents, scores, request.top_k)?;
    info!(
        "Reranked {} candidates, returning {} for '{}'",
        texts.len(),
        ranked.len(),
        preview
    );
    Ok(RerankOutcome::Ranked(ranked))
}
