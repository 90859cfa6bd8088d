// SPDX-License-Identifier: MIT

//! What flows back over the wire: command responses and asynchronous
//! notifications, multiplexed on the same connection.

use ksi_core::{Notification, ResponseEnvelope};
use serde::{Deserialize, Serialize};

/// A single frame read from a connection's outbound direction. Untagged:
/// `ResponseEnvelope` always carries `status`, `Notification` never does,
/// so the two shapes are unambiguous to `serde_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Response(ResponseEnvelope),
    Notification(Notification),
}

impl From<ResponseEnvelope> for ServerMessage {
    fn from(r: ResponseEnvelope) -> Self {
        ServerMessage::Response(r)
    }
}

impl From<Notification> for ServerMessage {
    fn from(n: Notification) -> Self {
        ServerMessage::Notification(n)
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
