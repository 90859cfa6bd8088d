// SPDX-License-Identifier: MIT

//! `message:*`/`message_bus:*` — subscription management and publish,
//! resolving the requesting connection through the connection directory
//! the same way `agent:connect` does.

use std::sync::Arc;

use serde_json::json;

use ksi_core::KsiError;

use super::{parse, string_array};
use crate::context::DaemonContext;
use crate::router::{FnHandler, HandlerOutcome};

fn resolve_connection(daemon: &DaemonContext, originator_id: &str) -> Option<crate::connection::ConnectionRef> {
    daemon
        .connections
        .get_by_str(originator_id)
        .or_else(|| daemon.registry.connection_of(&ksi_core::AgentId::from_string(originator_id)))
}

#[derive(serde::Deserialize)]
struct PublishRequest {
    event_name: String,
    #[serde(default)]
    data: serde_json::Value,
}

pub fn register(ctx: &Arc<DaemonContext>) {
    let daemon = ctx.clone();
    ctx.router.register(
        "message:subscribe",
        Arc::new(FnHandler::new(move |data, ectx| {
            let daemon = daemon.clone();
            async move {
                let patterns = string_array(&data, "patterns");
                if patterns.is_empty() {
                    return Err(KsiError::bad_request("missing required field `patterns`"));
                }
                let connection = resolve_connection(&daemon, &ectx.originator_id).ok_or_else(|| {
                    KsiError::new(ksi_core::ErrorCode::ConnectionError, "requesting connection not found")
                })?;
                daemon.bus.subscriptions.subscribe(&ectx.originator_id, &patterns, connection, ectx.timestamp);
                Ok(HandlerOutcome::value(json!({"subscribed": patterns})))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "message:unsubscribe",
        Arc::new(FnHandler::new(move |data, ectx| {
            let daemon = daemon.clone();
            async move {
                let patterns = string_array(&data, "patterns");
                let patterns_ref = if patterns.is_empty() { None } else { Some(patterns.as_slice()) };
                daemon.bus.subscriptions.unsubscribe(&ectx.originator_id, patterns_ref);
                Ok(HandlerOutcome::value(json!({"unsubscribed": true})))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "message:subscriptions",
        Arc::new(FnHandler::new(move |_data, ectx| {
            let daemon = daemon.clone();
            async move {
                let patterns = daemon.bus.subscriptions.patterns_for(&ectx.originator_id);
                Ok(HandlerOutcome::value(json!({"patterns": patterns})))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "message:publish",
        Arc::new(FnHandler::new(move |data, ectx| {
            let daemon = daemon.clone();
            async move {
                let request: PublishRequest = parse(data)?;
                let outcome =
                    daemon.bus.publish(&request.event_name, &ectx.originator_id, request.data, &ectx, daemon.registry.as_ref());
                Ok(HandlerOutcome::value(serde_json::to_value(outcome).unwrap_or(json!({}))))
            }
        })),
        0,
    );

    let daemon = ctx.clone();
    ctx.router.register(
        "message_bus:stats",
        Arc::new(FnHandler::new(move |_data, _ectx| {
            let daemon = daemon.clone();
            async move { Ok(HandlerOutcome::value(daemon.bus.stats())) }
        })),
        0,
    );
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
