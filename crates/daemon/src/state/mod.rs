// SPDX-License-Identifier: MIT

//! Entity-Attribute-Value store with typed relationships — grounded in `graph_state_tools.py`'s entity /
//! relationship / traversal primitives.

mod types;

pub use types::{Direction, Entity, GraphTraversal, Relationship};

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use ksi_core::{ErrorCode, KsiError, SharedClock};

/// Both maps are plain `RwLock<HashMap>` — this store answers point
/// lookups and bounded-depth traversals, not ad hoc joins, so a real
/// query engine would be overkill.
pub struct EntityStore {
    clock: SharedClock,
    entities: RwLock<HashMap<String, Entity>>,
    relationships: RwLock<HashMap<String, Relationship>>,
}

impl EntityStore {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock, entities: RwLock::new(HashMap::new()), relationships: RwLock::new(HashMap::new()) }
    }

    /// `state:entity:create`. `id` defaults to a generated id when absent.
    pub fn create_entity(
        &self,
        id: Option<String>,
        entity_type: String,
        properties: HashMap<String, Value>,
    ) -> Result<Entity, KsiError> {
        let id = id.unwrap_or_else(|| nanoid::nanoid!());
        let mut entities = self.entities.write();
        if entities.contains_key(&id) {
            return Err(KsiError::new(ErrorCode::BadRequest, format!("entity {id} already exists")));
        }
        let now = self.clock.epoch_ns();
        let entity = Entity { id: id.clone(), entity_type, properties, created_at: now, updated_at: now };
        entities.insert(id, entity.clone());
        Ok(entity)
    }

    /// `state:entity:update`. `merge: true` shallow-merges `properties`
    /// into the existing bag; `merge: false` replaces it wholesale.
    pub fn update_entity(
        &self,
        id: &str,
        properties: HashMap<String, Value>,
        merge: bool,
    ) -> Result<Entity, KsiError> {
        let mut entities = self.entities.write();
        let entity = entities
            .get_mut(id)
            .ok_or_else(|| KsiError::not_found(format!("entity {id} not found")))?;
        if merge {
            entity.properties.extend(properties);
        } else {
            entity.properties = properties;
        }
        entity.updated_at = self.clock.epoch_ns();
        Ok(entity.clone())
    }

    /// `state:entity:get`.
    pub fn get_entity(&self, id: &str) -> Option<Entity> {
        self.entities.read().get(id).cloned()
    }

    /// `state:entity:query` / `:list`. `properties` filters require an
    /// exact value match on every listed key.
    pub fn query_entities(
        &self,
        entity_type: Option<&str>,
        properties: &HashMap<String, Value>,
        limit: usize,
    ) -> Vec<Entity> {
        self.entities
            .read()
            .values()
            .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
            .filter(|e| properties.iter().all(|(k, v)| e.properties.get(k) == Some(v)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// `state:entity:delete`. Also removes every relationship touching the
    /// entity, so the graph never holds a dangling edge.
    pub fn delete_entity(&self, id: &str) -> Result<(), KsiError> {
        let removed = self.entities.write().remove(id);
        if removed.is_none() {
            return Err(KsiError::not_found(format!("entity {id} not found")));
        }
        self.relationships.write().retain(|_, r| r.from != id && r.to != id);
        Ok(())
    }

    /// `state:relationship:create`. Both endpoints must already exist.
    pub fn create_relationship(
        &self,
        from: String,
        to: String,
        relationship_type: String,
        properties: HashMap<String, Value>,
    ) -> Result<Relationship, KsiError> {
        let entities = self.entities.read();
        if !entities.contains_key(&from) {
            return Err(KsiError::not_found(format!("entity {from} not found")));
        }
        if !entities.contains_key(&to) {
            return Err(KsiError::not_found(format!("entity {to} not found")));
        }
        drop(entities);

        let id = nanoid::nanoid!();
        let relationship = Relationship {
            id: id.clone(),
            relationship_type,
            from,
            to,
            properties,
            created_at: self.clock.epoch_ns(),
        };
        self.relationships.write().insert(id, relationship.clone());
        Ok(relationship)
    }

    /// `state:relationship:list`. Filters by `direction` relative to
    /// `entity_id` and, optionally, by relationship type.
    pub fn list_relationships(
        &self,
        entity_id: &str,
        direction: Direction,
        relationship_type: Option<&str>,
    ) -> Vec<Relationship> {
        self.relationships
            .read()
            .values()
            .filter(|r| match direction {
                Direction::Outgoing => r.from == entity_id,
                Direction::Incoming => r.to == entity_id,
                Direction::Both => r.from == entity_id || r.to == entity_id,
            })
            .filter(|r| relationship_type.map_or(true, |t| r.relationship_type == t))
            .cloned()
            .collect()
    }

    /// `state:graph:traverse`. Breadth-first from `start_entity`, bounded
    /// by `max_depth`, optionally filtered to a set of relationship types.
    /// Each visited entity's `paths` entry is the first (shortest) route
    /// found to reach it.
    pub fn traverse(
        &self,
        start_entity: &str,
        max_depth: usize,
        direction: Direction,
        relationship_types: Option<&[String]>,
    ) -> Result<GraphTraversal, KsiError> {
        let start = self
            .get_entity(start_entity)
            .ok_or_else(|| KsiError::not_found(format!("entity {start_entity} not found")))?;

        let mut visited_entities = HashMap::new();
        let mut visited_relationships = HashMap::new();
        let mut paths = Vec::new();
        visited_entities.insert(start.id.clone(), start);
        paths.push(vec![start_entity.to_string()]);

        let mut frontier = vec![(start_entity.to_string(), vec![start_entity.to_string()])];
        for _ in 0..max_depth {
            let mut next_frontier = Vec::new();
            for (current_id, path) in &frontier {
                for relationship in self.list_relationships(current_id, direction, None) {
                    if let Some(types) = relationship_types {
                        if !types.contains(&relationship.relationship_type) {
                            continue;
                        }
                    }
                    let neighbor_id = if relationship.from == *current_id { &relationship.to } else { &relationship.from };
                    visited_relationships.insert(relationship.id.clone(), relationship.clone());
                    if visited_entities.contains_key(neighbor_id) {
                        continue;
                    }
                    let Some(neighbor) = self.get_entity(neighbor_id) else { continue };
                    let mut neighbor_path = path.clone();
                    neighbor_path.push(neighbor_id.clone());
                    paths.push(neighbor_path.clone());
                    visited_entities.insert(neighbor_id.clone(), neighbor);
                    next_frontier.push((neighbor_id.clone(), neighbor_path));
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        Ok(GraphTraversal {
            entities: visited_entities.into_values().collect(),
            relationships: visited_relationships.into_values().collect(),
            paths,
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
