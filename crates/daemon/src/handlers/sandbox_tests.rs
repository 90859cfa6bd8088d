// SPDX-License-Identifier: MIT

use super::*;
use ksi_core::{AgentId, ConnId, Originator};

fn test_context(dir: &std::path::Path) -> Arc<DaemonContext> {
    let ctx = DaemonContext::build(crate::config::for_tests(dir));
    register(&ctx);
    ctx
}

#[tokio::test]
async fn create_then_get_round_trips_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path());
    let agent_id = AgentId::new();

    ctx.router
        .emit_root(
            "sandbox:create",
            json!({"agent_id": agent_id, "mode": {"mode": "ISOLATED"}}),
            Originator::Connection(ConnId::new()),
        )
        .await;

    let result = ctx.router.emit_root("sandbox:get", json!({"agent_id": agent_id}), Originator::Connection(ConnId::new())).await;
    assert!(result.first_response().unwrap()["path"].as_str().unwrap().ends_with(agent_id.as_str()));
}

#[tokio::test]
async fn get_for_an_unknown_agent_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path());

    let result = ctx
        .router
        .emit_root("sandbox:get", json!({"agent_id": "agt-doesnotexist"}), Originator::Connection(ConnId::new()))
        .await;
    assert_eq!(result.first_error().unwrap().code, ksi_core::ErrorCode::NotFound);
}

#[tokio::test]
async fn list_reflects_every_created_sandbox() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path());
    let agent_id = AgentId::new();
    ctx.router
        .emit_root(
            "sandbox:create",
            json!({"agent_id": agent_id, "mode": {"mode": "ISOLATED"}}),
            Originator::Connection(ConnId::new()),
        )
        .await;

    let result = ctx.router.emit_root("sandbox:list", json!({}), Originator::Connection(ConnId::new())).await;
    assert_eq!(result.first_response().unwrap().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn remove_deletes_the_sandbox_entry() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path());
    let agent_id = AgentId::new();
    ctx.router
        .emit_root(
            "sandbox:create",
            json!({"agent_id": agent_id, "mode": {"mode": "ISOLATED"}}),
            Originator::Connection(ConnId::new()),
        )
        .await;

    let result = ctx.router.emit_root("sandbox:remove", json!({"agent_id": agent_id}), Originator::Connection(ConnId::new())).await;
    assert_eq!(result.first_response().unwrap()["removed"], json!(true));
    assert!(ctx.sandbox.get(&agent_id).is_none());
}
