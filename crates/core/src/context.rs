// SPDX-License-Identifier: MIT

//! Event context: system-injected metadata that travels alongside `data`
//! through the router, never mixed into handler-visible payload keys
//!.

use crate::clock::Clock;
use crate::ids::{AgentId, ConnId, CorrelationId, EventId, SessionId};
use serde::{Deserialize, Serialize};

/// Default cap on transformer-chain depth.
pub const DEFAULT_TRANSFORMER_DEPTH_CAP: u32 = 16;

/// System metadata injected by the router on every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub originator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_correlation_id: Option<CorrelationId>,
    pub event_id: EventId,
    /// UTC nanoseconds.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_agent: Option<AgentId>,
    /// Transformer-chain depth, incremented only when a transformer derives
    /// a new event from this one. Not meaningful outside that
    /// mechanism and defaulted away when absent from wire input.
    #[serde(default)]
    pub transform_depth: u32,
}

/// Identifies who initiated a root event: a raw connection or a bound agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Originator {
    Connection(ConnId),
    Agent(AgentId),
}

impl Originator {
    pub fn as_originator_id(&self) -> String {
        match self {
            Originator::Connection(c) => c.to_string(),
            Originator::Agent(a) => a.to_string(),
        }
    }
}

impl EventContext {
    /// Construct the context for a root event (one entering from a client
    /// connection rather than from inside another handler).
    pub fn root(originator: Originator, clock: &impl Clock) -> Self {
        let agent_id = match &originator {
            Originator::Agent(a) => Some(*a),
            Originator::Connection(_) => None,
        };
        Self {
            originator_id: originator.as_originator_id(),
            agent_id,
            session_id: None,
            correlation_id: CorrelationId::new(),
            parent_correlation_id: None,
            event_id: EventId::new(),
            timestamp: clock.epoch_ns(),
            source_agent: None,
            transform_depth: 0,
        }
    }

    /// Construct the context for an event emitted from inside a handler
    /// that is currently processing `self`. `correlation_id` is freshly
    /// generated; `parent_correlation_id` points back to `self`.
    /// `originator_id`, `agent_id`, `session_id` are inherited unless
    /// explicitly overridden afterward.
    pub fn child(&self, clock: &impl Clock) -> Self {
        Self {
            originator_id: self.originator_id.clone(),
            agent_id: self.agent_id,
            session_id: self.session_id,
            correlation_id: CorrelationId::new(),
            parent_correlation_id: Some(self.correlation_id),
            event_id: EventId::new(),
            timestamp: clock.epoch_ns(),
            source_agent: self.source_agent,
            transform_depth: self.transform_depth,
        }
    }

    /// Construct the context for a transformer-derived event: same as
    /// [`child`](Self::child) but increments the transformer depth counter
    /// used for loop detection.
    pub fn derived(&self, clock: &impl Clock) -> Self {
        let mut ctx = self.child(clock);
        ctx.transform_depth = self.transform_depth + 1;
        ctx
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
