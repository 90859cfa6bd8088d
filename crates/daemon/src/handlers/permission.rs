// SPDX-License-Identifier: MIT

//! `permission:*` — profile lookup and the monotone spawn-validation rule
//!.

use std::sync::Arc;

use serde_json::json;

use ksi_core::{AgentId, PermissionLevel, PermissionOverrides};

use super::{not_found, parse, required_str};
use crate::context::DaemonContext;
use crate::router::{FnHandler, HandlerOutcome};

#[derive(serde::Deserialize)]
struct ValidateSpawnRequest {
    parent_agent_id: AgentId,
    base_level: PermissionLevel,
    #[serde(default)]
    overrides: PermissionOverrides,
}

#[derive(serde::Deserialize)]
struct SetAgentRequest {
    agent_id: AgentId,
    base_level: PermissionLevel,
    #[serde(default)]
    overrides: PermissionOverrides,
}

pub fn register(ctx: &Arc<DaemonContext>) {
    let daemon = ctx.clone();
    ctx.router.register(
        "permission:get_profile",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let level_str = required_str(&data, "level")?;
                let level: PermissionLevel = serde_json::from_value(json!(level_str))
                    .map_err(|_| ksi_core::KsiError::bad_request(format!("unknown permission level `{level_str}`")))?;
                let profile = daemon.permissions.profile(level).ok_or_else(|| not_found("permission profile", level_str))?;
                Ok(HandlerOutcome::value(serde_json::to_value(profile).unwrap_or(json!({}))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "permission:list_profiles",
        Arc::new(FnHandler::new(move |_data, _ectx| {
            let daemon = daemon.clone();
            async move {
                Ok(HandlerOutcome::value(serde_json::to_value(daemon.permissions.list_profiles()).unwrap_or(json!([]))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "permission:get_agent",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let agent_id = AgentId::from_string(required_str(&data, "agent_id")?);
                let profile = daemon.permissions.agent_profile(&agent_id).ok_or_else(|| not_found("agent permissions", agent_id.as_str()))?;
                Ok(HandlerOutcome::value(serde_json::to_value(profile).unwrap_or(json!({}))))
            }
        })),
        0,
    );

    // Administrative assignment: directly (re)assign an agent's permission
    // profile. Unlike `permission:validate_spawn`, this does not check
    // the requested profile against a parent's authority — it is the
    // operator-facing counterpart used e.g. at `agent:spawn` time.
    let daemon = ctx.clone();
    ctx.router.register(
        "permission:set_agent",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request: SetAgentRequest = parse(data)?;
                let base = daemon
                    .permissions
                    .profile(request.base_level)
                    .ok_or_else(|| not_found("permission profile", &format!("{:?}", request.base_level)))?;
                let profile = request.overrides.apply(&base);
                daemon.permissions.assign(request.agent_id, profile.clone());
                Ok(HandlerOutcome::value(serde_json::to_value(profile).unwrap_or(json!({}))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "permission:validate_spawn",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request: ValidateSpawnRequest = parse(data)?;
                let derived =
                    daemon.permissions.validate_spawn(&request.parent_agent_id, request.base_level, &request.overrides)?;
                Ok(HandlerOutcome::value(serde_json::to_value(derived).unwrap_or(json!({}))))
            }
        })),
        0,
    );
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
