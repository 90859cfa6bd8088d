// SPDX-License-Identifier: MIT

//! `system:*` — daemon lifecycle and context handoff.

use std::sync::Arc;

use serde_json::json;

use crate::context::DaemonContext;
use crate::router::{FnHandler, HandlerOutcome};

pub fn register(ctx: &Arc<DaemonContext>) {
    let daemon = ctx.clone();
    ctx.router.register(
        "system:startup",
        Arc::new(FnHandler::new(move |_data, _ectx| {
            let daemon = daemon.clone();
            async move {
                Ok(HandlerOutcome::value(json!({
                    "status": "ok",
                    "agents": daemon.registry.list().len(),
                    "connections": daemon.connections.len(),
                    "inflight_subprocesses": daemon.supervisor.inflight_count(),
                })))
            }
        })),
        0,
    );

    ctx.router.register(
        "system:ready",
        Arc::new(FnHandler::new(|_data, _ectx| async { Ok(HandlerOutcome::value(json!({"ready": true}))) })),
        0,
    );

    ctx.router.register(
        "system:context",
        Arc::new(FnHandler::new(|_data, ectx| async move {
            let value = serde_json::to_value(&ectx).unwrap_or(json!({}));
            Ok(HandlerOutcome::value(value))
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "system:shutdown",
        Arc::new(FnHandler::new(move |_data, _ectx| {
            let daemon = daemon.clone();
            async move {
                daemon.shutdown.notify_waiters();
                Ok(HandlerOutcome::terminal(json!({"status": "shutting_down"})))
            }
        })),
        0,
    );
}

#[cfg(test)]
#[path = "system_tests.rs"]
mod tests;
