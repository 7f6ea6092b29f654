pub mod client;
pub mod supabase;

pub use client::{Neo4jClient, Neo4jClientError, Row, Statement};
pub use supabase::{DocumentStore, DocumentStoreError, MatchedDocument, SupabaseClient, TableSample};
