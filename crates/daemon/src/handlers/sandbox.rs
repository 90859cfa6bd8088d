// SPDX-License-Identifier: MIT

//! `sandbox:*` — per-agent workspace lifecycle.

use std::sync::Arc;

use serde_json::json;

use ksi_core::{AgentId, SandboxConfig, SandboxMode};

use super::{not_found, parse, required_str};
use crate::context::DaemonContext;
use crate::router::{FnHandler, HandlerOutcome};

#[derive(serde::Deserialize)]
struct CreateRequest {
    agent_id: AgentId,
    mode: SandboxMode,
}

pub fn register(ctx: &Arc<DaemonContext>) {
    let daemon = ctx.clone();
    ctx.router.register(
        "sandbox:create",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request: CreateRequest = parse(data)?;
                let metadata = daemon.sandbox.create(request.agent_id, SandboxConfig { agent_id: request.agent_id, mode: request.mode })?;
                Ok(HandlerOutcome::value(serde_json::to_value(metadata).unwrap_or(json!({}))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "sandbox:get",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let agent_id = AgentId::from_string(required_str(&data, "agent_id")?);
                let path = daemon.sandbox.get(&agent_id).ok_or_else(|| not_found("sandbox", agent_id.as_str()))?;
                Ok(HandlerOutcome::value(json!({"agent_id": agent_id, "path": path.display().to_string()})))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "sandbox:list",
        Arc::new(FnHandler::new(move |_data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let sandboxes: Vec<_> = daemon
                    .sandbox
                    .list()
                    .into_iter()
                    .map(|(agent_id, path)| json!({"agent_id": agent_id, "path": path.display().to_string()}))
                    .collect();
                Ok(HandlerOutcome::value(json!(sandboxes)))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "sandbox:remove",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let agent_id = AgentId::from_string(required_str(&data, "agent_id")?);
                let force = data.get("force").and_then(serde_json::Value::as_bool).unwrap_or(false);
                daemon.sandbox.remove(&agent_id, force)?;
                Ok(HandlerOutcome::value(json!({"agent_id": agent_id, "removed": true})))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "sandbox:stats",
        Arc::new(FnHandler::new(move |_data, _ectx| {
            let daemon = daemon.clone();
            async move {
                Ok(HandlerOutcome::value(json!({"count": daemon.sandbox.list().len()})))
            }
        })),
        0,
    );
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
