// SPDX-License-Identifier: MIT

use super::*;
use ksi_core::ConnId;

fn test_context(dir: &std::path::Path) -> Arc<DaemonContext> {
    let ctx = DaemonContext::build(crate::config::for_tests(dir));
    register(&ctx);
    ctx
}

#[tokio::test]
async fn startup_reports_empty_counts_on_a_fresh_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path());

    let result = ctx.router.emit_root("system:startup", json!({}), Originator::Connection(ConnId::new())).await;

    let response = result.first_response().unwrap();
    assert_eq!(response["agents"], json!(0));
    assert_eq!(response["connections"], json!(0));
    assert_eq!(response["inflight_subprocesses"], json!(0));
}

#[tokio::test]
async fn context_returns_the_dispatching_event_context() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path());

    let result = ctx.router.emit_root("system:context", json!({}), Originator::Connection(ConnId::new())).await;
    let response = result.first_response().unwrap();
    assert!(response.get("event_id").is_some());
}

#[tokio::test]
async fn shutdown_wakes_the_shutdown_notify_and_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(dir.path());

    let notified = ctx.shutdown.notified();
    tokio::pin!(notified);

    let result = ctx.router.emit_root("system:shutdown", json!({}), Originator::Connection(ConnId::new())).await;
    assert_eq!(result.first_response().unwrap()["status"], json!("shutting_down"));

    tokio::time::timeout(std::time::Duration::from_secs(1), notified).await.expect("shutdown should have notified");
}
