pub mod fixtures;
pub mod knowledge;
pub mod models;
pub mod neo4j;
pub mod search;
pub mod store;

pub use fixtures::{CenterSearch, DemoDataset, FixtureError};
pub use knowledge::{KnowledgeGraph, SearchConfig};
pub use models::{EntityEdge, EntityNode, GraphStats, Triplet};
pub use neo4j::Neo4jGraphStore;
pub use store::{GraphError, GraphStore, InMemoryGraphStore};
