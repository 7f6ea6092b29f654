use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub uuid: Uuid,
    pub name: String,
    pub summary: String,
    pub group_id: String,
    pub created_at: DateTime<Utc>,
}

impl EntityNode {

    pub fn new(name: impl Into<String>, summary: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            summary: summary.into(),
            group_id: group_id.into(),
            created_at: Utc::now(),
        }
    }
}


/// A directed, typed, fact-bearing relationship between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEdge {
    pub uuid: Uuid,
    pub group_id: String,
    pub source_node_uuid: Uuid,
    pub target_node_uuid: Uuid,
    /// Relationship type, e.g. `CEO_OF`.
    pub name: String,
    pub fact: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub valid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub invalid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub fact_embedding: Option<Vec<f32>>,
}

impl EntityEdge {

    pub fn new(
        source: &EntityNode,
        target: &EntityNode,
        name: impl Into<String>,
        fact: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            group_id: group_id.into(),
            source_node_uuid: source.uuid,
            target_node_uuid: target.uuid,
            name: name.into(),
            fact: fact.into(),
            created_at: Utc::now(),
            valid_at: None,
            invalid_at: None,
            fact_embedding: None,
        }
    }


    pub fn with_validity(
        mut self,
        valid_at: Option<DateTime<Utc>>,
        invalid_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_at = valid_at;
        self.invalid_at = invalid_at;
        self
    }


    pub fn connects(&self, source: &EntityNode, target: &EntityNode) -> bool {
        self.source_node_uuid == source.uuid && self.target_node_uuid == target.uuid
    }


    pub fn endpoints(&self) -> [Uuid; 2] {
        [self.source_node_uuid, self.target_node_uuid]
    }
}


#[derive(Debug, Clone)]
pub struct Triplet {
    pub source: EntityNode,
    pub edge: EntityEdge,
    pub target: EntityNode,
}


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub entities: usize,
    pub relationships: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_links_its_endpoints() {
        let sam = EntityNode::new("Sam Altman", "CEO of OpenAI", "ai_demo");
        let openai = EntityNode::new("OpenAI", "AI research company", "ai_demo");
        let edge = EntityEdge::new(&sam, &openai, "CEO_OF", "Sam Altman is the CEO of OpenAI", "ai_demo");

        assert!(edge.connects(&sam, &openai));
        assert!(!edge.connects(&openai, &sam));
        assert_eq!(edge.endpoints(), [sam.uuid, openai.uuid]);
    }

    #[test]
    fn test_fact_embedding_not_serialized() {
        let a = EntityNode::new("A", "a", "g");
        let b = EntityNode::new("B", "b", "g");
        let mut edge = EntityEdge::new(&a, &b, "REL", "A relates to B", "g");
        edge.fact_embedding = Some(vec![0.1; 4]);

        let json = serde_json::to_value(&edge).unwrap();
        assert!(json.get("fact_embedding").is_none());
        assert_eq!(json["fact"], "A relates to B");
    }
}
