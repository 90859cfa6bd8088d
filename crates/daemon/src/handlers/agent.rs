// SPDX-License-Identifier: MIT

//! `agent:*` — lifecycle, listing, and persistent-connection binding.
//! `connect`/`disconnect` resolve the requesting connection through the
//! connection directory rather than through the `Handler` trait, which
//! only sees `(data, context)`.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use ksi_core::{Agent, AgentId, AgentState, ErrorCode, KsiError, PermissionOverrides, SandboxConfig, SandboxMode};

use super::{not_found, parse, required_str};
use crate::context::DaemonContext;
use crate::router::{FnHandler, HandlerOutcome};

#[derive(Deserialize)]
struct SpawnRequest {
    profile_name: String,
    base_level: ksi_core::PermissionLevel,
    #[serde(default)]
    overrides: PermissionOverrides,
    #[serde(default)]
    parent_agent_id: Option<AgentId>,
    #[serde(default)]
    session_id: Option<ksi_core::SessionId>,
    #[serde(default)]
    sandbox_mode: Option<SandboxMode>,
    #[serde(default)]
    capabilities: Vec<String>,
}

pub fn register(ctx: &Arc<DaemonContext>) {
    let daemon = ctx.clone();
    ctx.router.register(
        "agent:spawn",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move { spawn(&daemon, parse(data)?) }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "agent:terminate",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let agent_id = AgentId::from_string(required_str(&data, "agent_id")?);
                let force = data.get("force").and_then(serde_json::Value::as_bool).unwrap_or(false);
                terminate(&daemon, agent_id, force)
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "agent:list",
        Arc::new(FnHandler::new(move |_data, _ectx| {
            let daemon = daemon.clone();
            async move { Ok(HandlerOutcome::value(serde_json::to_value(daemon.registry.list()).unwrap_or(json!([])))) }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "agent:info",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let agent_id = AgentId::from_string(required_str(&data, "agent_id")?);
                let agent = daemon.registry.get(&agent_id).ok_or_else(|| not_found("agent", agent_id.as_str()))?;
                Ok(HandlerOutcome::value(serde_json::to_value(agent).unwrap_or(json!({}))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "agent:connect",
        Arc::new(FnHandler::new(move |data, ectx| {
            let daemon = daemon.clone();
            async move {
                let agent_id = AgentId::from_string(required_str(&data, "agent_id")?);
                let agent = daemon.registry.get(&agent_id).ok_or_else(|| not_found("agent", agent_id.as_str()))?;
                if agent.is_terminal() {
                    return Err(KsiError::new(ErrorCode::BadRequest, "cannot connect to a dead agent"));
                }
                let connection = daemon
                    .connections
                    .get_by_str(&ectx.originator_id)
                    .ok_or_else(|| KsiError::new(ErrorCode::ConnectionError, "requesting connection not found"))?;
                daemon.registry.bind_connection(&agent_id, connection.clone())?;
                daemon.bus.flush_offline(&agent_id, &connection);
                Ok(HandlerOutcome::value(json!({"agent_id": agent_id, "connected": true})))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "agent:disconnect",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let agent_id = AgentId::from_string(required_str(&data, "agent_id")?);
                daemon.registry.unbind_connection(&agent_id);
                Ok(HandlerOutcome::value(json!({"agent_id": agent_id, "connected": false})))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "agent:set_capabilities",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let agent_id = AgentId::from_string(required_str(&data, "agent_id")?);
                let capabilities: BTreeSet<String> = super::string_array(&data, "capabilities").into_iter().collect();
                daemon.registry.set_capabilities(&agent_id, capabilities);
                Ok(HandlerOutcome::value(json!({"agent_id": agent_id})))
            }
        })),
        0,
    );
}

fn spawn(daemon: &DaemonContext, request: SpawnRequest) -> Result<HandlerOutcome, KsiError> {
    let permissions = match request.parent_agent_id {
        Some(parent_id) => daemon.permissions.validate_spawn(&parent_id, request.base_level, &request.overrides)?,
        None => daemon
            .permissions
            .profile(request.base_level)
            .ok_or_else(|| not_found("permission profile", &format!("{:?}", request.base_level)))?,
    };

    let agent_id = AgentId::new();
    let sandbox_mode = request.sandbox_mode.unwrap_or(SandboxMode::Isolated);
    let sandbox = daemon.sandbox.create(agent_id, SandboxConfig { agent_id, mode: sandbox_mode })?;

    let agent = Agent {
        agent_id,
        profile_name: request.profile_name,
        permissions: permissions.clone(),
        sandbox_id: sandbox.sandbox_id,
        parent_agent_id: request.parent_agent_id,
        session_id: request.session_id,
        state: AgentState::Registering,
    };
    daemon.registry.register(agent.clone());
    daemon.permissions.assign(agent_id, permissions.clone());
    if !request.capabilities.is_empty() {
        daemon.registry.set_capabilities(&agent_id, request.capabilities.into_iter().collect());
    }
    daemon.registry.set_state(&agent_id, AgentState::Ready)?;

    Ok(HandlerOutcome::value(json!({
        "agent_id": agent_id,
        "sandbox": sandbox,
        "permissions": permissions,
    })))
}

fn terminate(daemon: &DaemonContext, agent_id: AgentId, force: bool) -> Result<HandlerOutcome, KsiError> {
    daemon.registry.get(&agent_id).ok_or_else(|| not_found("agent", agent_id.as_str()))?;
    daemon.registry.set_state(&agent_id, AgentState::Terminating)?;
    daemon.sandbox.remove(&agent_id, force)?;
    daemon.registry.set_state(&agent_id, AgentState::Dead)?;
    daemon.permissions.remove(&agent_id);
    daemon.registry.remove(&agent_id);
    Ok(HandlerOutcome::value(json!({"agent_id": agent_id, "terminated": true})))
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
