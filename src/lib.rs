pub mod core;
pub mod db;
pub mod graph;
pub mod llm;
pub mod mcp;
pub mod rerank;
pub mod utils;

pub use utils::safe_truncate;


pub use core::config::{GraphSettings, ProbeSettings, RerankSettings, Transport};
pub use core::error::{KgError, Result};
pub use graph::{EntityEdge, EntityNode, KnowledgeGraph, SearchConfig};
pub use llm::embeddings::{Embedder, EmbeddingGenerator};
pub use rerank::{RerankContext, RerankOutcome, RerankRequest, ScoredDocument};


pub const DEFAULT_COLLECTION: &str = "documents_reranking";


pub const DEFAULT_MATCH_COUNT: usize = 15;


pub const DEFAULT_TOP_K: usize = 15;


pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";


pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";


pub const DEFAULT_GROUP_ID: &str = "ai_demo";


pub const NO_MATCHES_MESSAGE: &str = "No matching documents found";
