use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::{EntityEdge, EntityNode, GraphStats};
use super::search::{rerank_by_distance, rrf, RRF_RANK_CONST};
use super::store::{GraphError, GraphStore};
use crate::llm::embeddings::Embedder;


pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.6;
pub const DEFAULT_MAX_DISTANCE: usize = 3;


#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub limit: usize,
    pub group_ids: Option<Vec<String>>,
    /// Rerank candidates by hop distance from this entity.
    pub center_node_uuid: Option<Uuid>,
    pub min_similarity: f64,
    pub max_distance: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            group_ids: None,
            center_node_uuid: None,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

impl SearchConfig {

    pub fn centered_on(mut self, center: Uuid) -> Self {
        self.center_node_uuid = Some(center);
        self
    }


    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }


    pub fn with_groups(mut self, group_ids: Vec<String>) -> Self {
        self.group_ids = Some(group_ids);
        self
    }
}


/// Triplet ingestion and hybrid relationship search over a [`GraphStore`].
pub struct KnowledgeGraph {
    store: Arc<dyn GraphStore>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl KnowledgeGraph {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        info!(
            "KnowledgeGraph initialized (vector search: {})",
            if embedder.is_some() { "on" } else { "off" }
        );
        Self { store, embedder }
    }


    pub async fn build_indices(&self) -> Result<(), GraphError> {
        self.store.build_indices().await
    }


    pub async fn clear(&self, group_ids: Option<&[String]>) -> Result<(), GraphError> {
        self.store.clear(group_ids).await
    }

    /// Store one `(source, edge, target)` triplet. The edge must point from
    /// `source` to `target`; nothing is written otherwise.
    pub async fn add_triplet(
        &self,
        source: &EntityNode,
        edge: &EntityEdge,
        target: &EntityNode,
    ) -> Result<(), GraphError> {
        if !edge.connects(source, target) {
            return Err(GraphError::InvalidTriplet(format!(
                "edge {} links {} -> {}, expected {} -> {}",
                edge.uuid, edge.source_node_uuid, edge.target_node_uuid, source.uuid, target.uuid
            )));
        }

        let mut edge = edge.clone();
        if edge.fact_embedding.is_none() {
            if let Some(embedder) = &self.embedder {
                edge.fact_embedding = Some(embedder.embed(&edge.fact).await?);
            }
        }

        self.store.save_triplet(source, &edge, target).await?;
        debug!("Added triplet {} -[{}]-> {}", source.name, edge.name, target.name);
        Ok(())
    }


    pub async fn search(&self, query: &str, config: &SearchConfig) -> Result<Vec<EntityEdge>, GraphError> {
        if config.limit == 0 {
            return Ok(Vec::new());
        }
        let groups = config.group_ids.as_deref();
        // Over-fetch so fusion and distance reranking have candidates to reorder.
        let fetch = config.limit.saturating_mul(2);

        let mut candidates: HashMap<Uuid, EntityEdge> = HashMap::new();
        let mut ranked_lists: Vec<Vec<Uuid>> = Vec::new();

        let fulltext = self.store.edge_fulltext_search(query, groups, fetch).await?;
        ranked_lists.push(fulltext.iter().map(|e| e.uuid).collect());
        candidates.extend(fulltext.into_iter().map(|e| (e.uuid, e)));

        if let Some(embedder) = &self.embedder {
            let query_embedding = embedder.embed(query).await?;
            let similar = self
                .store
                .edge_similarity_search(&query_embedding, groups, fetch, config.min_similarity)
                .await?;
            ranked_lists.push(similar.iter().map(|e| e.uuid).collect());
            candidates.extend(similar.into_iter().map(|e| (e.uuid, e)));
        }

        let mut results: Vec<EntityEdge> = rrf(&ranked_lists, RRF_RANK_CONST)
            .into_iter()
            .filter_map(|(uuid, _)| candidates.remove(&uuid))
            .collect();

        if let Some(center) = config.center_node_uuid {
            let endpoints: Vec<Uuid> = results
                .iter()
                .flat_map(EntityEdge::endpoints)
                .filter(|node| *node != center)
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            let distances = self
                .store
                .node_distances(center, &endpoints, config.max_distance)
                .await?;
            results = rerank_by_distance(results, center, &distances);
        }

        results.truncate(config.limit);
        if results.is_empty() {
            warn!("No relationships matched '{}'", crate::safe_truncate(query, 60));
        } else {
            debug!("Search '{}' returned {} edges", crate::safe_truncate(query, 60), results.len());
        }
        Ok(results)
    }


    pub async fn stats(&self) -> Result<GraphStats, GraphError> {
        self.store.stats().await
    }


    pub async fn close(&self) -> Result<(), GraphError> {
        self.store.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::InMemoryGraphStore;
    use crate::llm::embeddings::EmbeddingError;
    use async_trait::async_trait;

    /// Maps text onto fixed axes by keyword so similarity is predictable.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let text = text.to_lowercase();
            Ok(["ceo", "developed", "transformer"]
                .iter()
                .map(|k| if text.contains(k) { 1.0 } else { 0.0 })
                .collect())
        }

        fn model(&self) -> &str {
            "keyword"
        }
    }

    fn sample_graph() -> (Vec<EntityNode>, Vec<EntityEdge>) {
        let claude = EntityNode::new("Claude", "assistant", "ai_demo");
        let anthropic = EntityNode::new("Anthropic", "company", "ai_demo");
        let dario = EntityNode::new("Dario Amodei", "CEO of Anthropic", "ai_demo");
        let gpt4 = EntityNode::new("GPT-4", "model", "ai_demo");

        let edges = vec![
            EntityEdge::new(&claude, &anthropic, "DEVELOPED_BY", "Claude is developed by Anthropic", "ai_demo"),
            EntityEdge::new(&dario, &anthropic, "CEO_OF", "Dario Amodei is the CEO of Anthropic", "ai_demo"),
            EntityEdge::new(&claude, &gpt4, "COMPETES_WITH", "Claude competes with GPT-4", "ai_demo"),
        ];
        (vec![claude, anthropic, dario, gpt4], edges)
    }

    async fn loaded(embedder: Option<Arc<dyn Embedder>>) -> (KnowledgeGraph, Vec<EntityNode>) {
        let graph = KnowledgeGraph::new(Arc::new(InMemoryGraphStore::new()), embedder);
        let (nodes, edges) = sample_graph();
        let by_uuid: HashMap<Uuid, &EntityNode> = nodes.iter().map(|n| (n.uuid, n)).collect();
        for edge in &edges {
            let source = by_uuid[&edge.source_node_uuid];
            let target = by_uuid[&edge.target_node_uuid];
            graph.add_triplet(source, edge, target).await.unwrap();
        }
        (graph, nodes)
    }

    #[tokio::test]
    async fn test_mismatched_triplet_rejected() {
        let graph = KnowledgeGraph::new(Arc::new(InMemoryGraphStore::new()), None);
        let (nodes, edges) = sample_graph();

        let result = graph.add_triplet(&nodes[2], &edges[0], &nodes[1]).await;
        assert!(matches!(result, Err(GraphError::InvalidTriplet(_))));
        assert_eq!(graph.stats().await.unwrap(), GraphStats::default());
    }

    #[tokio::test]
    async fn test_fulltext_only_search() {
        let (graph, _) = loaded(None).await;
        let results = graph.search("Who is the CEO of Anthropic?", &SearchConfig::default()).await.unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].fact, "Dario Amodei is the CEO of Anthropic");
    }

    #[tokio::test]
    async fn test_embeddings_fill_and_fuse() {
        let (graph, _) = loaded(Some(Arc::new(KeywordEmbedder))).await;
        // "ceos" shares no token with any fact; only the vector list can match.
        let results = graph.search("ceos", &SearchConfig::default()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "CEO_OF");
    }

    #[tokio::test]
    async fn test_center_node_reorders_results() {
        let (graph, nodes) = loaded(None).await;
        let gpt4 = nodes[3].uuid;

        let plain = graph.search("Claude Anthropic GPT-4", &SearchConfig::default()).await.unwrap();
        let centered = graph
            .search("Claude Anthropic GPT-4", &SearchConfig::default().centered_on(gpt4))
            .await
            .unwrap();

        assert_eq!(plain.len(), centered.len());
        assert_eq!(centered[0].name, "COMPETES_WITH");
        assert_eq!(centered.last().map(|e| e.name.as_str()), Some("CEO_OF"));
    }

    #[tokio::test]
    async fn test_limit_and_groups() {
        let (graph, _) = loaded(None).await;
        let one = graph.search("Claude", &SearchConfig::default().with_limit(1)).await.unwrap();
        assert_eq!(one.len(), 1);

        let other_group = graph
            .search("Claude", &SearchConfig::default().with_groups(vec!["elsewhere".into()]))
            .await
            .unwrap();
        assert!(other_group.is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_limit_returns_every_match() {
        let (graph, _) = loaded(None).await;
        let bounded = graph.search("Claude", &SearchConfig::default()).await.unwrap();
        let unbounded = graph
            .search("Claude", &SearchConfig::default().with_limit(usize::MAX))
            .await
            .unwrap();
        assert!(!unbounded.is_empty());
        assert!(unbounded.len() >= bounded.len());
    }
}
