// SPDX-License-Identifier: MIT

use super::*;
use ksi_core::FakeClock;
use std::collections::HashMap;

fn store() -> EntityStore {
    EntityStore::new(SharedClock::new(FakeClock::new()))
}

fn props(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn create_entity_assigns_an_id_when_none_given() {
    let store = store();
    let entity = store.create_entity(None, "agent".to_string(), HashMap::new()).unwrap();
    assert!(!entity.id.is_empty());
    assert_eq!(entity.created_at, entity.updated_at);
}

#[test]
fn create_entity_with_a_duplicate_explicit_id_fails() {
    let store = store();
    store.create_entity(Some("e1".to_string()), "agent".to_string(), HashMap::new()).unwrap();
    let err = store.create_entity(Some("e1".to_string()), "agent".to_string(), HashMap::new()).unwrap_err();
    assert_eq!(err.code, ErrorCode::BadRequest);
}

#[test]
fn update_entity_merges_properties_by_default() {
    let store = store();
    store
        .create_entity(Some("e1".to_string()), "agent".to_string(), props(&[("name", Value::String("a".into()))]))
        .unwrap();

    let updated = store.update_entity("e1", props(&[("role", Value::String("reviewer".into()))]), true).unwrap();
    assert_eq!(updated.properties.len(), 2);
}

#[test]
fn update_entity_replaces_properties_when_merge_is_false() {
    let store = store();
    store
        .create_entity(Some("e1".to_string()), "agent".to_string(), props(&[("name", Value::String("a".into()))]))
        .unwrap();

    let updated = store.update_entity("e1", props(&[("role", Value::String("reviewer".into()))]), false).unwrap();
    assert_eq!(updated.properties.len(), 1);
    assert!(updated.properties.get("name").is_none());
}

#[test]
fn update_entity_on_unknown_id_is_not_found() {
    let store = store();
    let err = store.update_entity("missing", HashMap::new(), true).unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[test]
fn query_entities_filters_by_type_and_exact_property_match() {
    let store = store();
    store.create_entity(Some("e1".to_string()), "agent".to_string(), props(&[("team", Value::String("a".into()))])).unwrap();
    store.create_entity(Some("e2".to_string()), "agent".to_string(), props(&[("team", Value::String("b".into()))])).unwrap();
    store.create_entity(Some("e3".to_string()), "task".to_string(), props(&[("team", Value::String("a".into()))])).unwrap();

    let results = store.query_entities(Some("agent"), &props(&[("team", Value::String("a".into()))]), 100);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "e1");
}

#[test]
fn delete_entity_removes_relationships_touching_it() {
    let store = store();
    store.create_entity(Some("a".to_string()), "agent".to_string(), HashMap::new()).unwrap();
    store.create_entity(Some("b".to_string()), "agent".to_string(), HashMap::new()).unwrap();
    store.create_relationship("a".to_string(), "b".to_string(), "spawned".to_string(), HashMap::new()).unwrap();

    store.delete_entity("a").unwrap();
    assert!(store.list_relationships("b", Direction::Both, None).is_empty());
}

#[test]
fn create_relationship_requires_both_endpoints_to_exist() {
    let store = store();
    store.create_entity(Some("a".to_string()), "agent".to_string(), HashMap::new()).unwrap();
    let err = store
        .create_relationship("a".to_string(), "missing".to_string(), "spawned".to_string(), HashMap::new())
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[test]
fn list_relationships_respects_direction_and_type_filters() {
    let store = store();
    for id in ["a", "b", "c"] {
        store.create_entity(Some(id.to_string()), "agent".to_string(), HashMap::new()).unwrap();
    }
    store.create_relationship("a".to_string(), "b".to_string(), "spawned".to_string(), HashMap::new()).unwrap();
    store.create_relationship("c".to_string(), "a".to_string(), "observes".to_string(), HashMap::new()).unwrap();

    assert_eq!(store.list_relationships("a", Direction::Outgoing, None).len(), 1);
    assert_eq!(store.list_relationships("a", Direction::Incoming, None).len(), 1);
    assert_eq!(store.list_relationships("a", Direction::Both, None).len(), 2);
    assert_eq!(store.list_relationships("a", Direction::Both, Some("spawned")).len(), 1);
}

#[test]
fn traverse_follows_outgoing_edges_up_to_max_depth() {
    let store = store();
    for id in ["a", "b", "c", "d"] {
        store.create_entity(Some(id.to_string()), "agent".to_string(), HashMap::new()).unwrap();
    }
    store.create_relationship("a".to_string(), "b".to_string(), "spawned".to_string(), HashMap::new()).unwrap();
    store.create_relationship("b".to_string(), "c".to_string(), "spawned".to_string(), HashMap::new()).unwrap();
    store.create_relationship("c".to_string(), "d".to_string(), "spawned".to_string(), HashMap::new()).unwrap();

    let result = store.traverse("a", 2, Direction::Outgoing, None).unwrap();
    let ids: std::collections::HashSet<_> = result.entities.iter().map(|e| e.id.clone()).collect();
    assert!(ids.contains("a"));
    assert!(ids.contains("b"));
    assert!(ids.contains("c"));
    assert!(!ids.contains("d"));
}

#[test]
fn traverse_filters_by_relationship_type() {
    let store = store();
    for id in ["a", "b", "c"] {
        store.create_entity(Some(id.to_string()), "agent".to_string(), HashMap::new()).unwrap();
    }
    store.create_relationship("a".to_string(), "b".to_string(), "spawned".to_string(), HashMap::new()).unwrap();
    store.create_relationship("a".to_string(), "c".to_string(), "observes".to_string(), HashMap::new()).unwrap();

    let result = store.traverse("a", 1, Direction::Outgoing, Some(&["spawned".to_string()])).unwrap();
    let ids: std::collections::HashSet<_> = result.entities.iter().map(|e| e.id.clone()).collect();
    assert!(ids.contains("b"));
    assert!(!ids.contains("c"));
}

#[test]
fn traverse_from_an_unknown_entity_is_not_found() {
    let store = store();
    let err = store.traverse("missing", 1, Direction::Outgoing, None).unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}
