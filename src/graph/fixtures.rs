use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::models::{EntityEdge, EntityNode, Triplet};


#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid fixture JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate entity key '{0}'")]
    DuplicateKey(String),
    #[error("Unknown entity key '{0}'")]
    UnknownKey(String),
}


#[derive(Debug, Deserialize)]
struct RawEntity {
    key: String,
    name: String,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    source: String,
    target: String,
    name: String,
    fact: String,
    #[serde(default)]
    valid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    invalid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawCenterSearch {
    description: String,
    query: String,
    center: String,
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    group_id: String,
    entities: Vec<RawEntity>,
    relationships: Vec<RawRelationship>,
    #[serde(default)]
    searches: Vec<String>,
    #[serde(default)]
    center_searches: Vec<RawCenterSearch>,
    #[serde(default)]
    multi_hop_searches: Vec<String>,
}


#[derive(Debug, Clone)]
pub struct CenterSearch {
    pub description: String,
    pub query: String,
    pub center: EntityNode,
}


/// Entities, relationships and canned queries for the triplet demo.
///
/// Entities are declared under a local key and relationships refer to those
/// keys; every load mints fresh uuids.
#[derive(Debug, Clone)]
pub struct DemoDataset {
    pub group_id: String,
    pub entities: Vec<EntityNode>,
    pub triplets: Vec<Triplet>,
    pub searches: Vec<String>,
    pub center_searches: Vec<CenterSearch>,
    pub multi_hop_searches: Vec<String>,
}

impl DemoDataset {

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let dataset = Self::from_json(&json)?;
        info!(
            "Loaded fixture {} ({} entities, {} relationships)",
            path.display(),
            dataset.entities.len(),
            dataset.triplets.len()
        );
        Ok(dataset)
    }


    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let raw: RawDataset = serde_json::from_str(json)?;
        let group_id = raw.group_id;

        let mut keyed: HashMap<String, EntityNode> = HashMap::new();
        let mut entities = Vec::with_capacity(raw.entities.len());
        for entity in raw.entities {
            if keyed.contains_key(&entity.key) {
                return Err(FixtureError::DuplicateKey(entity.key));
            }
            let node = EntityNode::new(entity.name, entity.summary, group_id.as_str());
            keyed.insert(entity.key, node.clone());
            entities.push(node);
        }

        let lookup = |key: &str| {
            keyed
                .get(key)
                .cloned()
                .ok_or_else(|| FixtureError::UnknownKey(key.to_string()))
        };

        let triplets = raw
            .relationships
            .into_iter()
            .map(|rel| {
                let source = lookup(&rel.source)?;
                let target = lookup(&rel.target)?;
                let edge = EntityEdge::new(&source, &target, rel.name, rel.fact, group_id.as_str())
                    .with_validity(rel.valid_at, rel.invalid_at);
                Ok(Triplet { source, edge, target })
            })
            .collect::<Result<Vec<_>, FixtureError>>()?;

        let center_searches = raw
            .center_searches
            .into_iter()
            .map(|search| {
                Ok(CenterSearch {
                    center: lookup(&search.center)?,
                    description: search.description,
                    query: search.query,
                })
            })
            .collect::<Result<Vec<_>, FixtureError>>()?;

        Ok(Self {
            group_id,
            entities,
            triplets,
            searches: raw.searches,
            center_searches,
            multi_hop_searches: raw.multi_hop_searches,
        })
    }
}
