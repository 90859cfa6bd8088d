// SPDX-License-Identifier: MIT

//! Pure type definitions for the entity-attribute-value store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A graph entity: a typed bag of properties identified by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub properties: HashMap<String, Value>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A directed, typed edge between two entities, with its own property bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub from: String,
    pub to: String,
    pub properties: HashMap<String, Value>,
    pub created_at: u64,
}

/// Direction to follow when listing or traversing relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "outgoing" => Some(Direction::Outgoing),
            "incoming" => Some(Direction::Incoming),
            "both" => Some(Direction::Both),
            _ => None,
        }
    }
}

/// Result of `state:graph:traverse`: every entity and relationship visited,
/// plus the path (list of entity ids) taken to reach each entity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphTraversal {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub paths: Vec<Vec<String>>,
}
