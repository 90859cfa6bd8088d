// SPDX-License-Identifier: MIT

//! `state:entity:*`, `state:relationship:*`, `state:graph:traverse` — the
//! Entity-Attribute-Value store's event surface.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use ksi_core::KsiError;

use super::{optional_str, parse, required_str};
use crate::context::DaemonContext;
use crate::router::{FnHandler, HandlerOutcome};
use crate::state::Direction;

#[derive(serde::Deserialize)]
struct CreateEntityRequest {
    #[serde(default)]
    id: Option<String>,
    entity_type: String,
    #[serde(default)]
    properties: HashMap<String, Value>,
}

#[derive(serde::Deserialize)]
struct UpdateEntityRequest {
    id: String,
    #[serde(default)]
    properties: HashMap<String, Value>,
    #[serde(default = "default_true")]
    merge: bool,
}

fn default_true() -> bool {
    true
}

#[derive(serde::Deserialize)]
struct QueryEntitiesRequest {
    #[serde(default)]
    entity_type: Option<String>,
    #[serde(default)]
    properties: HashMap<String, Value>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    100
}

#[derive(serde::Deserialize)]
struct CreateRelationshipRequest {
    from: String,
    to: String,
    relationship_type: String,
    #[serde(default)]
    properties: HashMap<String, Value>,
}

#[derive(serde::Deserialize)]
struct TraverseRequest {
    start_entity: String,
    #[serde(default = "default_max_depth")]
    max_depth: usize,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    relationship_types: Option<Vec<String>>,
}

fn default_max_depth() -> usize {
    3
}

pub fn register(ctx: &Arc<DaemonContext>) {
    let daemon = ctx.clone();
    ctx.router.register(
        "state:entity:create",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request: CreateEntityRequest = parse(data)?;
                let entity = daemon.state.create_entity(request.id, request.entity_type, request.properties)?;
                Ok(HandlerOutcome::value(serde_json::to_value(entity).unwrap_or(json!({}))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "state:entity:update",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request: UpdateEntityRequest = parse(data)?;
                let entity = daemon.state.update_entity(&request.id, request.properties, request.merge)?;
                Ok(HandlerOutcome::value(serde_json::to_value(entity).unwrap_or(json!({}))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "state:entity:get",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let id = required_str(&data, "id")?;
                let entity = daemon.state.get_entity(id).ok_or_else(|| super::not_found("entity", id))?;
                Ok(HandlerOutcome::value(serde_json::to_value(entity).unwrap_or(json!({}))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "state:entity:query",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request: QueryEntitiesRequest = parse(data)?;
                let entities = daemon.state.query_entities(request.entity_type.as_deref(), &request.properties, request.limit);
                Ok(HandlerOutcome::value(serde_json::to_value(entities).unwrap_or(json!([]))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "state:entity:delete",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let id = required_str(&data, "id")?.to_string();
                daemon.state.delete_entity(&id)?;
                Ok(HandlerOutcome::value(json!({"id": id, "deleted": true})))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "state:relationship:create",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request: CreateRelationshipRequest = parse(data)?;
                let relationship =
                    daemon.state.create_relationship(request.from, request.to, request.relationship_type, request.properties)?;
                Ok(HandlerOutcome::value(serde_json::to_value(relationship).unwrap_or(json!({}))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "state:relationship:list",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let entity_id = required_str(&data, "entity_id")?;
                let direction = match optional_str(&data, "direction") {
                    Some(s) => Direction::parse(s).ok_or_else(|| KsiError::bad_request(format!("unknown direction `{s}`")))?,
                    None => Direction::Both,
                };
                let relationship_type = optional_str(&data, "relationship_type");
                let relationships = daemon.state.list_relationships(entity_id, direction, relationship_type);
                Ok(HandlerOutcome::value(serde_json::to_value(relationships).unwrap_or(json!([]))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "state:graph:traverse",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request: TraverseRequest = parse(data)?;
                let direction = match request.direction.as_deref() {
                    Some(s) => Direction::parse(s).ok_or_else(|| KsiError::bad_request(format!("unknown direction `{s}`")))?,
                    None => Direction::Both,
                };
                let traversal = daemon.state.traverse(
                    &request.start_entity,
                    request.max_depth,
                    direction,
                    request.relationship_types.as_deref(),
                )?;
                Ok(HandlerOutcome::value(serde_json::to_value(traversal).unwrap_or(json!({}))))
            }
        })),
        0,
    );
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
