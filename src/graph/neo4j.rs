use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{EntityEdge, EntityNode, GraphStats};
use super::search::lucene_sanitize;
use super::store::{GraphError, GraphStore};
use crate::db::{Neo4jClient, Row, Statement};


pub const EDGE_FULLTEXT_INDEX: &str = "edge_name_and_fact";

const INDEX_STATEMENTS: &[&str] = &[
    "CREATE INDEX entity_uuid IF NOT EXISTS FOR (n:Entity) ON (n.uuid)",
    "CREATE INDEX entity_group_id IF NOT EXISTS FOR (n:Entity) ON (n.group_id)",
    "CREATE INDEX relation_uuid IF NOT EXISTS FOR ()-[e:RELATES_TO]-() ON (e.uuid)",
    "CREATE INDEX relation_group_id IF NOT EXISTS FOR ()-[e:RELATES_TO]-() ON (e.group_id)",
    "CREATE FULLTEXT INDEX node_name_and_summary IF NOT EXISTS FOR (n:Entity) ON EACH [n.name, n.summary, n.group_id]",
    "CREATE FULLTEXT INDEX edge_name_and_fact IF NOT EXISTS FOR ()-[e:RELATES_TO]-() ON EACH [e.name, e.fact, e.group_id]",
];

const SAVE_NODE: &str = "MERGE (n:Entity {uuid: $uuid}) \
     SET n.name = $name, n.summary = $summary, n.group_id = $group_id, n.created_at = $created_at";

const SAVE_EDGE: &str = "MATCH (source:Entity {uuid: $source_uuid}) \
     MATCH (target:Entity {uuid: $target_uuid}) \
     MERGE (source)-[e:RELATES_TO {uuid: $uuid}]->(target) \
     SET e.name = $name, e.fact = $fact, e.group_id = $group_id, e.created_at = $created_at, \
         e.valid_at = $valid_at, e.invalid_at = $invalid_at, e.fact_embedding = $fact_embedding";

const EDGE_RETURN: &str = "RETURN e.uuid AS uuid, e.group_id AS group_id, \
     n.uuid AS source_node_uuid, m.uuid AS target_node_uuid, \
     e.name AS name, e.fact AS fact, e.created_at AS created_at, \
     e.valid_at AS valid_at, e.invalid_at AS invalid_at";


#[derive(Deserialize)]
struct EdgeRecord {
    uuid: Uuid,
    group_id: String,
    source_node_uuid: Uuid,
    target_node_uuid: Uuid,
    name: String,
    fact: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    valid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    invalid_at: Option<DateTime<Utc>>,
}

impl From<EdgeRecord> for EntityEdge {
    fn from(r: EdgeRecord) -> Self {
        EntityEdge {
            uuid: r.uuid,
            group_id: r.group_id,
            source_node_uuid: r.source_node_uuid,
            target_node_uuid: r.target_node_uuid,
            name: r.name,
            fact: r.fact,
            created_at: r.created_at,
            valid_at: r.valid_at,
            invalid_at: r.invalid_at,
            fact_embedding: None,
        }
    }
}


fn decode_edges(rows: Vec<Row>) -> Result<Vec<EntityEdge>, GraphError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value::<EdgeRecord>(Value::Object(row))
                .map(EntityEdge::from)
                .map_err(|e| GraphError::Decode(e.to_string()))
        })
        .collect()
}


fn node_statement(node: &EntityNode) -> Statement {
    Statement::with_params(
        SAVE_NODE,
        json!({
            "uuid": node.uuid,
            "name": node.name,
            "summary": node.summary,
            "group_id": node.group_id,
            "created_at": node.created_at,
        }),
    )
}


fn edge_statement(edge: &EntityEdge) -> Statement {
    Statement::with_params(
        SAVE_EDGE,
        json!({
            "uuid": edge.uuid,
            "source_uuid": edge.source_node_uuid,
            "target_uuid": edge.target_node_uuid,
            "name": edge.name,
            "fact": edge.fact,
            "group_id": edge.group_id,
            "created_at": edge.created_at,
            "valid_at": edge.valid_at,
            "invalid_at": edge.invalid_at,
            "fact_embedding": edge.fact_embedding,
        }),
    )
}


/// Graph store backed by Neo4j's HTTP transaction API.
pub struct Neo4jGraphStore {
    client: Neo4jClient,
}

impl Neo4jGraphStore {

    pub fn new(client: Neo4jClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn build_indices(&self) -> Result<(), GraphError> {
        // Schema changes cannot share a transaction with other statements.
        for cypher in INDEX_STATEMENTS {
            self.client.run(Statement::new(*cypher)).await?;
        }
        info!("Neo4j indices ready ({} statements)", INDEX_STATEMENTS.len());
        Ok(())
    }

    async fn clear(&self, group_ids: Option<&[String]>) -> Result<(), GraphError> {
        let statement = match group_ids {
            None => Statement::new("MATCH (n) DETACH DELETE n"),
            Some(groups) => Statement::with_params(
                "MATCH (n:Entity) WHERE n.group_id IN $group_ids DETACH DELETE n",
                json!({ "group_ids": groups }),
            ),
        };
        self.client.run(statement).await?;
        Ok(())
    }

    async fn save_triplet(
        &self,
        source: &EntityNode,
        edge: &EntityEdge,
        target: &EntityNode,
    ) -> Result<(), GraphError> {
        self.client
            .run_in_transaction(vec![
                node_statement(source),
                node_statement(target),
                edge_statement(edge),
            ])
            .await?;
        debug!("Saved triplet {} -[{}]-> {}", source.name, edge.name, target.name);
        Ok(())
    }

    async fn edge_fulltext_search(
        &self,
        query: &str,
        group_ids: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<EntityEdge>, GraphError> {
        let sanitized = lucene_sanitize(query);
        if sanitized.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let cypher = format!(
            "CALL db.index.fulltext.queryRelationships(\"{EDGE_FULLTEXT_INDEX}\", $query, {{limit: $limit}}) \
             YIELD relationship AS e, score \
             MATCH (n:Entity)-[e]->(m:Entity) \
             WHERE $group_ids IS NULL OR e.group_id IN $group_ids \
             {EDGE_RETURN} \
             ORDER BY score DESC LIMIT $limit"
        );
        let rows = self
            .client
            .run(Statement::with_params(
                cypher,
                json!({ "query": sanitized, "group_ids": group_ids, "limit": limit }),
            ))
            .await?;
        decode_edges(rows)
    }

    async fn edge_similarity_search(
        &self,
        embedding: &[f32],
        group_ids: Option<&[String]>,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<EntityEdge>, GraphError> {
        if embedding.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let cypher = format!(
            "MATCH (n:Entity)-[e:RELATES_TO]->(m:Entity) \
             WHERE e.fact_embedding IS NOT NULL AND ($group_ids IS NULL OR e.group_id IN $group_ids) \
             WITH n, e, m, vector.similarity.cosine(e.fact_embedding, $search_vector) AS score \
             WHERE score >= $min_score \
             {EDGE_RETURN} \
             ORDER BY score DESC LIMIT $limit"
        );
        let rows = self
            .client
            .run(Statement::with_params(
                cypher,
                json!({
                    "search_vector": embedding,
                    "group_ids": group_ids,
                    "min_score": min_score,
                    "limit": limit,
                }),
            ))
            .await?;
        decode_edges(rows)
    }

    async fn node_distances(
        &self,
        center: Uuid,
        nodes: &[Uuid],
        max_depth: usize,
    ) -> Result<HashMap<Uuid, usize>, GraphError> {
        if nodes.is_empty() || max_depth == 0 {
            return Ok(HashMap::new());
        }

        // Variable-length bounds cannot be parameters.
        let cypher = format!(
            "MATCH (center:Entity {{uuid: $center_uuid}}) \
             UNWIND $node_uuids AS node_uuid \
             MATCH (n:Entity {{uuid: node_uuid}}) \
             WHERE n.uuid <> $center_uuid \
             MATCH p = shortestPath((center)-[:RELATES_TO*..{max_depth}]-(n)) \
             RETURN n.uuid AS uuid, length(p) AS distance"
        );
        let rows = self
            .client
            .run(Statement::with_params(
                cypher,
                json!({ "center_uuid": center, "node_uuids": nodes }),
            ))
            .await?;

        #[derive(Deserialize)]
        struct DistanceRecord {
            uuid: Uuid,
            distance: usize,
        }

        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<DistanceRecord>(Value::Object(row))
                    .map(|r| (r.uuid, r.distance))
                    .map_err(|e| GraphError::Decode(e.to_string()))
            })
            .collect()
    }

    async fn stats(&self) -> Result<GraphStats, GraphError> {
        let rows = self
            .client
            .run(Statement::new(
                "MATCH (n:Entity) WITH count(n) AS entities \
                 OPTIONAL MATCH ()-[e:RELATES_TO]->() \
                 RETURN entities, count(e) AS relationships",
            ))
            .await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| GraphError::Decode("empty stats result".to_string()))?;
        let count = |key: &str| {
            row.get(key)
                .and_then(Value::as_u64)
                .map(|v| v as usize)
                .ok_or_else(|| GraphError::Decode(format!("missing '{key}' in stats result")))
        };
        Ok(GraphStats {
            entities: count("entities")?,
            relationships: count("relationships")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, routing::post, Json, Router};
    use std::sync::Arc;

    type Captured = Arc<parking_lot::Mutex<Vec<Value>>>;

    async fn spawn_stub(reply: Value) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/db/neo4j/tx/commit",
                post(
                    |State((seen, reply)): State<(Captured, Value)>, Json(body): Json<Value>| async move {
                        seen.lock().push(body);
                        Json(reply)
                    },
                ),
            )
            .with_state((captured.clone(), reply));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), captured)
    }

    fn store_for(base: &str) -> Neo4jGraphStore {
        Neo4jGraphStore::new(Neo4jClient::new(base, "neo4j", "password", "neo4j", 5).unwrap())
    }

    #[tokio::test]
    async fn test_triplet_is_one_transaction() {
        let empty = json!({ "columns": [], "data": [] });
        let (base, captured) =
            spawn_stub(json!({ "results": [empty.clone(), empty.clone(), empty], "errors": [] })).await;
        let store = store_for(&base);

        let claude = EntityNode::new("Claude", "assistant", "ai_demo");
        let anthropic = EntityNode::new("Anthropic", "company", "ai_demo");
        let edge = EntityEdge::new(&claude, &anthropic, "DEVELOPED_BY", "Claude is developed by Anthropic", "ai_demo");
        store.save_triplet(&claude, &edge, &anthropic).await.unwrap();

        let requests = captured.lock();
        assert_eq!(requests.len(), 1);
        let statements = requests[0]["statements"].as_array().unwrap();
        assert_eq!(statements.len(), 3);
        assert!(statements[0]["statement"].as_str().unwrap().starts_with("MERGE (n:Entity"));
        assert_eq!(statements[2]["parameters"]["source_uuid"], json!(claude.uuid));
        assert_eq!(statements[2]["parameters"]["target_uuid"], json!(anthropic.uuid));
    }

    #[tokio::test]
    async fn test_fulltext_decodes_edges() {
        let edge_uuid = Uuid::new_v4();
        let (source, target) = (Uuid::new_v4(), Uuid::new_v4());
        let reply = json!({
            "results": [{
                "columns": ["uuid", "group_id", "source_node_uuid", "target_node_uuid", "name", "fact", "created_at", "valid_at", "invalid_at"],
                "data": [{ "row": [edge_uuid, "ai_demo", source, target, "CEO_OF", "Sam Altman is the CEO of OpenAI", "2025-01-01T00:00:00Z", "2019-03-01T00:00:00Z", null] }]
            }],
            "errors": []
        });
        let (base, captured) = spawn_stub(reply).await;
        let store = store_for(&base);

        let edges = store
            .edge_fulltext_search("Who is the CEO of OpenAI?", None, 5)
            .await
            .unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].uuid, edge_uuid);
        assert!(edges[0].valid_at.is_some());
        assert!(edges[0].invalid_at.is_none());

        let requests = captured.lock();
        let params = &requests[0]["statements"][0]["parameters"];
        assert_eq!(params["query"], "Who is the CEO of OpenAI\\?");
        assert!(params["group_ids"].is_null());
    }

    #[tokio::test]
    async fn test_blank_query_skips_round_trip() {
        let (base, captured) = spawn_stub(json!({ "results": [], "errors": [] })).await;
        let store = store_for(&base);
        assert!(store.edge_fulltext_search("   ", None, 5).await.unwrap().is_empty());
        assert!(captured.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stats_decoding() {
        let reply = json!({
            "results": [{ "columns": ["entities", "relationships"], "data": [{ "row": [15, 17] }] }],
            "errors": []
        });
        let (base, _) = spawn_stub(reply).await;
        let stats = store_for(&base).stats().await.unwrap();
        assert_eq!(stats, GraphStats { entities: 15, relationships: 17 });
    }
}
