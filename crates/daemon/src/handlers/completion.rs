// SPDX-License-Identifier: MIT

//! `completion:*` — spawns a CLI LLM provider as a subprocess through the
//! Subprocess Supervisor, tied to an agent's sandbox workspace.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use ksi_core::{
    AgentId, AgentState, ConversationId, ErrorCode, KsiError, RequestId, ResponseId, WORKSPACE_DIR,
};

use super::{not_found, parse, required_str};
use crate::context::DaemonContext;
use crate::router::{FnHandler, HandlerOutcome};
use crate::supervisor::{map_exit_status, ClaudeCli, GeminiCli, Provider, SpawnRequest};

#[derive(Deserialize)]
struct AsyncRequest {
    agent_id: AgentId,
    prompt: String,
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    conversation_id: Option<ConversationId>,
    #[serde(default)]
    progress_timeout_ms: Option<u64>,
}

fn default_provider() -> String {
    "claude_cli".to_string()
}

fn provider_for(name: &str) -> Result<Box<dyn Provider>, KsiError> {
    match name {
        "claude_cli" => Ok(Box::new(ClaudeCli)),
        "gemini_cli" => Ok(Box::new(GeminiCli)),
        other => Err(KsiError::bad_request(format!("unknown completion provider `{other}`"))),
    }
}

pub fn register(ctx: &Arc<DaemonContext>) {
    let daemon = ctx.clone();
    ctx.router.register(
        "completion:async",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request: AsyncRequest = parse(data)?;
                run_completion(&daemon, request).await
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "completion:status",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request_id = RequestId::from_string(required_str(&data, "request_id")?);
                let inflight = daemon.supervisor.is_inflight(&request_id);
                Ok(HandlerOutcome::value(json!({
                    "request_id": request_id,
                    "state": if inflight { "running" } else { "completed" },
                })))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "completion:cancel",
        Arc::new(FnHandler::new(move |data, _ectx| {
            let daemon = daemon.clone();
            async move {
                let request_id = RequestId::from_string(required_str(&data, "request_id")?);
                daemon.supervisor.cancel(&request_id).await;
                Ok(HandlerOutcome::value(json!({"request_id": request_id, "canceled": true})))
            }
        })),
        0,
    );
}

async fn run_completion(daemon: &DaemonContext, request: AsyncRequest) -> Result<HandlerOutcome, KsiError> {
    let agent = daemon.registry.get(&request.agent_id).ok_or_else(|| not_found("agent", request.agent_id.as_str()))?;
    if !agent.permissions.capabilities.spawn_agents && agent.state == AgentState::Dead {
        return Err(KsiError::new(ErrorCode::BadRequest, "agent is dead"));
    }

    let workspace = daemon
        .sandbox
        .get(&request.agent_id)
        .ok_or_else(|| not_found("sandbox", request.agent_id.as_str()))?
        .join(WORKSPACE_DIR);

    let provider = provider_for(&request.provider)?;
    let request_id = RequestId::new();
    let progress_timeout =
        request.progress_timeout_ms.map(Duration::from_millis).unwrap_or(daemon.config.progress_timeout);

    let spawn_request = SpawnRequest {
        request_id,
        program: provider.program().to_string(),
        args: provider.args(&request.prompt, request.session_id.as_deref()),
        cwd: workspace,
        env: HashMap::new(),
        progress_timeout,
        attempt_timeouts: daemon.config.attempt_timeouts.clone(),
    };

    daemon.registry.set_state(&request.agent_id, AgentState::Busy)?;
    let outcome = daemon.supervisor.spawn(spawn_request).await;
    daemon.registry.set_state(&request.agent_id, AgentState::Ready)?;
    let outcome = outcome?;

    if let Some(error) = map_exit_status(&outcome) {
        return Err(error);
    }

    let session_id = provider
        .structured_output()
        .then(|| serde_json::from_str::<serde_json::Value>(&outcome.stdout).ok())
        .flatten()
        .and_then(|v| v.get("session_id").and_then(|s| s.as_str().map(str::to_string)));

    let result_text = if provider.structured_output() {
        serde_json::from_str::<serde_json::Value>(&outcome.stdout)
            .ok()
            .and_then(|v| v.get("result").and_then(|r| r.as_str().map(str::to_string)))
            .unwrap_or(outcome.stdout.clone())
    } else {
        outcome.stdout.clone()
    };

    if let Some(conversation_id) = request.conversation_id {
        daemon.registry.record_response(conversation_id, ResponseId::new());
    }

    Ok(HandlerOutcome::value(json!({
        "request_id": request_id,
        "session_id": session_id,
        "result": result_text,
        "duration_ms": outcome.duration.as_millis() as u64,
    })))
}

#[cfg(test)]
#[path = "completion_tests.rs"]
mod tests;
