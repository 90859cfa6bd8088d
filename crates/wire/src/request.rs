// SPDX-License-Identifier: MIT

//! What a client sends over the wire: a bare `{name, data}` pair. The
//! daemon injects `context` on arrival — clients never
//! construct or see a context on the way in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRequest {
    pub name: String,
    #[serde(default = "default_data")]
    pub data: Value,
    /// Present only on the first request of a TCP connection, checked
    /// against the daemon's configured token before anything else about
    /// the request is processed. Unix connections never need this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_data() -> Value {
    Value::Object(Default::default())
}

impl ClientRequest {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self { name: name.into(), data, auth_token: None }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
