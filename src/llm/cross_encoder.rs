//! Cross-encoder relevance scoring.
//!
//! A cross-encoder reads the query and a document together and emits one
//! relevance logit per pair. The model itself is external (fastembed's ONNX
//! build of the chosen reranker); this module only adapts it to
//! [`RelevanceScorer`] so the rerank pipeline can be driven by any scorer.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "cross-encoder")]
use std::sync::Arc;

#[cfg(feature = "cross-encoder")]
use tracing::info;

#[cfg(feature = "cross-encoder")]
use crate::core::config::RerankerModel;


#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Model initialization failed: {0}")]
    Init(String),

    #[error("Scoring failed: {0}")]
    Inference(String),

    #[error("Scorer returned {got} scores for {expected} documents")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Scoring task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}


/// Scores `(query, document)` pairs. Output is aligned with `documents`.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, ScoringError>;


    fn model_name(&self) -> &str;
}


/// fastembed `TextRerank` wrapper. Construction downloads the model on first use.
#[cfg(feature = "cross-encoder")]
pub struct CrossEncoder {
    model: Arc<fastembed::TextRerank>,
    name: String,
}

#[cfg(feature = "cross-encoder")]
impl CrossEncoder {

    pub fn try_new(model: RerankerModel) -> Result<Self, ScoringError> {
        let fastembed_model = match model {
            RerankerModel::BgeRerankerBase => fastembed::RerankerModel::BGERerankerBase,
            RerankerModel::BgeRerankerV2M3 => fastembed::RerankerModel::BGERerankerV2M3,
            RerankerModel::JinaRerankerV1TurboEn => fastembed::RerankerModel::JINARerankerV1TurboEn,
        };

        let options =
            fastembed::RerankInitOptions::new(fastembed_model).with_show_download_progress(false);
        let inner = fastembed::TextRerank::try_new(options)
            .map_err(|e| ScoringError::Init(e.to_string()))?;

        info!("Cross-encoder loaded: {}", model);

        Ok(Self {
            model: Arc::new(inner),
            name: model.to_string(),
        })
    }
}

#[cfg(feature = "cross-encoder")]
#[async_trait]
impl RelevanceScorer for CrossEncoder {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, ScoringError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let query = query.to_string();
        let docs = documents.to_vec();
        let expected = docs.len();

        // ONNX inference is CPU-bound; keep it off the async workers.
        let ranked = tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
            model.rerank(query.as_str(), refs, false, None)
        })
        .await?
        .map_err(|e| ScoringError::Inference(e.to_string()))?;

        if ranked.len() != expected {
            return Err(ScoringError::LengthMismatch {
                expected,
                got: ranked.len(),
            });
        }

        // fastembed returns results sorted by score; put them back in input order.
        let mut scores = vec![0.0_f32; expected];
        for result in ranked {
            let slot = scores.get_mut(result.index).ok_or(ScoringError::LengthMismatch {
                expected,
                got: result.index + 1,
            })?;
            *slot = result.score;
        }
        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
