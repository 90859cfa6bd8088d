// SPDX-License-Identifier: MIT

//! Live connection directory: lets handlers resolve the raw `conn_id` or
//! `agent_id` string carried in an event's context back to a
//! [`ConnectionRef`] without threading the transport layer through the
//! `Handler` trait.
//!
//! Agent-bound lookups go through the Agent Registry instead; this
//! directory only tracks raw, possibly-anonymous connections by `conn_id`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use ksi_core::ConnId;

use crate::connection::ConnectionRef;

#[derive(Default)]
pub struct ConnectionDirectory {
    connections: RwLock<HashMap<ConnId, ConnectionRef>>,
}

impl ConnectionDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, connection: ConnectionRef) {
        self.connections.write().insert(connection.conn_id, connection);
    }

    pub fn unregister(&self, conn_id: ConnId) {
        self.connections.write().remove(&conn_id);
    }

    pub fn get(&self, conn_id: ConnId) -> Option<ConnectionRef> {
        self.connections.read().get(&conn_id).cloned()
    }

    /// Looks up by the raw string form carried in `EventContext::originator_id`.
    pub fn get_by_str(&self, conn_id: &str) -> Option<ConnectionRef> {
        self.get(ConnId::from_string(conn_id))
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }
}

#[cfg(test)]
#[path = "connections_tests.rs"]
mod tests;
