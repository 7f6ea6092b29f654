pub mod pipeline;
pub mod probe;

pub use pipeline::{
    rank_documents, search_and_rerank, RerankContext, RerankError, RerankOutcome, RerankRequest,
    ScoredDocument,
};
pub use probe::{check_connection, test_supabase_connection};
