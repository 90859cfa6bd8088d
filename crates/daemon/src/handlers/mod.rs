// SPDX-License-Identifier: MIT

//! Wires the core event surface onto the Event Router at startup.
//! Each submodule owns one category of the table; this module only holds
//! the shared request-parsing helpers and the top-level `register_all`.

mod agent;
mod completion;
mod message;
mod permission;
mod sandbox;
mod state;
mod system;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use ksi_core::{ErrorCode, KsiError};

use crate::context::DaemonContext;

/// Register every handler named in the core event surface table. Called
/// once, before the accept loop starts.
pub fn register_all(ctx: &Arc<DaemonContext>) {
    system::register(ctx);
    agent::register(ctx);
    completion::register(ctx);
    message::register(ctx);
    permission::register(ctx);
    sandbox::register(ctx);
    state::register(ctx);
}

/// Deserialize the whole `data` payload into `T`, wrapping a mismatch as
/// `BAD_REQUEST` rather than letting serde's message leak verbatim.
fn parse<T: DeserializeOwned>(data: Value) -> Result<T, KsiError> {
    serde_json::from_value(data).map_err(|e| KsiError::bad_request(format!("invalid request body: {e}")))
}

fn required_str<'a>(data: &'a Value, key: &str) -> Result<&'a str, KsiError> {
    data.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| KsiError::bad_request(format!("missing required field `{key}`")))
}

fn optional_str<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

fn string_array(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn not_found(what: &str, id: &str) -> KsiError {
    KsiError::new(ErrorCode::NotFound, format!("{what} {id} not found"))
}
