pub mod cross_encoder;
pub mod embeddings;

pub use cross_encoder::{RelevanceScorer, ScoringError};
#[cfg(feature = "cross-encoder")]
pub use cross_encoder::CrossEncoder;
pub use embeddings::{Embedder, EmbeddingError, EmbeddingGenerator};
