use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::models::{EntityEdge, EntityNode, GraphStats};
use super::search::{bm25_rank, cosine_similarity};
use crate::db::Neo4jClientError;
use crate::llm::embeddings::EmbeddingError;


#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid triplet: {0}")]
    InvalidTriplet(String),

    #[error("Neo4j error: {0}")]
    Neo4j(#[from] Neo4jClientError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Malformed record: {0}")]
    Decode(String),
}


/// Persistence and retrieval primitives for entity/relationship graphs.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create indices and constraints. Safe to call repeatedly.
    async fn build_indices(&self) -> Result<(), GraphError>;

    /// Delete everything, or only the given groups.
    async fn clear(&self, group_ids: Option<&[String]>) -> Result<(), GraphError>;

    /// Upsert both entities and the relationship as one unit, keyed by uuid.
    async fn save_triplet(
        &self,
        source: &EntityNode,
        edge: &EntityEdge,
        target: &EntityNode,
    ) -> Result<(), GraphError>;

    async fn edge_fulltext_search(
        &self,
        query: &str,
        group_ids: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<EntityEdge>, GraphError>;

    async fn edge_similarity_search(
        &self,
        embedding: &[f32],
        group_ids: Option<&[String]>,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<EntityEdge>, GraphError>;

    /// Undirected hop counts from `center` to each reachable node in `nodes`,
    /// bounded by `max_depth`. Unreachable nodes are absent from the map.
    async fn node_distances(
        &self,
        center: Uuid,
        nodes: &[Uuid],
        max_depth: usize,
    ) -> Result<HashMap<Uuid, usize>, GraphError>;

    async fn stats(&self) -> Result<GraphStats, GraphError>;

    async fn close(&self) -> Result<(), GraphError> {
        Ok(())
    }
}


fn in_groups(group_id: &str, group_ids: Option<&[String]>) -> bool {
    group_ids.is_none_or(|groups| groups.iter().any(|g| g == group_id))
}


#[derive(Default)]
struct MemoryGraph {
    nodes: HashMap<Uuid, EntityNode>,
    edges: Vec<EntityEdge>,
    edge_index: HashMap<Uuid, usize>,
}


/// Process-local store for offline runs and tests.
#[derive(Default)]
pub struct InMemoryGraphStore {
    graph: RwLock<MemoryGraph>,
}

impl InMemoryGraphStore {

    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn build_indices(&self) -> Result<(), GraphError> {
        Ok(())
    }

    async fn clear(&self, group_ids: Option<&[String]>) -> Result<(), GraphError> {
        let mut graph = self.graph.write();
        match group_ids {
            None => *graph = MemoryGraph::default(),
            Some(_) => {
                graph.nodes.retain(|_, n| !in_groups(&n.group_id, group_ids));
                graph.edges.retain(|e| !in_groups(&e.group_id, group_ids));
                let reindexed = graph
                    .edges
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (e.uuid, i))
                    .collect();
                graph.edge_index = reindexed;
            }
        }
        Ok(())
    }

    async fn save_triplet(
        &self,
        source: &EntityNode,
        edge: &EntityEdge,
        target: &EntityNode,
    ) -> Result<(), GraphError> {
        let mut graph = self.graph.write();
        graph.nodes.insert(source.uuid, source.clone());
        graph.nodes.insert(target.uuid, target.clone());

        match graph.edge_index.get(&edge.uuid).copied() {
            Some(i) => graph.edges[i] = edge.clone(),
            None => {
                let i = graph.edges.len();
                graph.edges.push(edge.clone());
                graph.edge_index.insert(edge.uuid, i);
            }
        }
        Ok(())
    }

    async fn edge_fulltext_search(
        &self,
        query: &str,
        group_ids: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<EntityEdge>, GraphError> {
        let graph = self.graph.read();
        let docs: Vec<(Uuid, String)> = graph
            .edges
            .iter()
            .filter(|e| in_groups(&e.group_id, group_ids))
            .map(|e| (e.uuid, format!("{} {}", e.name, e.fact)))
            .collect();

        Ok(bm25_rank(query, &docs, limit)
            .into_iter()
            .filter_map(|(id, _)| graph.edge_index.get(&id).map(|&i| graph.edges[i].clone()))
            .collect())
    }

    async fn edge_similarity_search(
        &self,
        embedding: &[f32],
        group_ids: Option<&[String]>,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<EntityEdge>, GraphError> {
        let graph = self.graph.read();
        let mut scored: Vec<(f64, &EntityEdge)> = graph
            .edges
            .iter()
            .filter(|e| in_groups(&e.group_id, group_ids))
            .filter_map(|e| {
                let fact_embedding = e.fact_embedding.as_deref()?;
                let score = cosine_similarity(embedding, fact_embedding);
                (score >= min_score).then_some((score, e))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn node_distances(
        &self,
        center: Uuid,
        nodes: &[Uuid],
        max_depth: usize,
    ) -> Result<HashMap<Uuid, usize>, GraphError> {
        let graph = self.graph.read();

        let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for edge in &graph.edges {
            adjacency.entry(edge.source_node_uuid).or_default().push(edge.target_node_uuid);
            adjacency.entry(edge.target_node_uuid).or_default().push(edge.source_node_uuid);
        }

        let wanted: HashSet<Uuid> = nodes.iter().copied().filter(|n| *n != center).collect();
        let mut found = HashMap::new();
        let mut visited = HashSet::from([center]);
        let mut queue = VecDeque::from([(center, 0usize)]);

        while let Some((node, depth)) = queue.pop_front() {
            if found.len() == wanted.len() {
                break;
            }
            if depth == max_depth {
                continue;
            }
            for next in adjacency.get(&node).into_iter().flatten() {
                if visited.insert(*next) {
                    if wanted.contains(next) {
                        found.insert(*next, depth + 1);
                    }
                    queue.push_back((*next, depth + 1));
                }
            }
        }

        debug!("Resolved {}/{} node distances from {}", found.len(), wanted.len(), center);
        Ok(found)
    }

    async fn stats(&self) -> Result<GraphStats, GraphError> {
        let graph = self.graph.read();
        Ok(GraphStats {
            entities: graph.nodes.len(),
            relationships: graph.edges.len(),
        })
    }
}
