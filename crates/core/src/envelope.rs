// SPDX-License-Identifier: MIT

//! Event and response envelopes exchanged over the transport.

use crate::context::EventContext;
use crate::error::KsiError;
use crate::ids::{CorrelationId, EventId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable emission: a dotted `name`, handler-defined `data`, and the
/// system-injected `context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub name: String,
    #[serde(default = "default_data")]
    pub data: Value,
    pub context: EventContext,
}

fn default_data() -> Value {
    Value::Object(Default::default())
}

impl EventEnvelope {
    pub fn new(name: impl Into<String>, data: Value, context: EventContext) -> Self {
        Self { name: name.into(), data, context }
    }
}

/// Reply to a single command: success carries the handler's
/// JSON payload, error carries `{code, message, details?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseEnvelope {
    #[serde(rename = "success")]
    Success {
        result: Value,
        correlation_id: CorrelationId,
        event_id: EventId,
    },
    #[serde(rename = "error")]
    Error {
        error: KsiError,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<CorrelationId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<EventId>,
    },
}

impl ResponseEnvelope {
    pub fn success(result: Value, ctx: &EventContext) -> Self {
        ResponseEnvelope::Success {
            result,
            correlation_id: ctx.correlation_id,
            event_id: ctx.event_id,
        }
    }

    pub fn error(error: KsiError, ctx: Option<&EventContext>) -> Self {
        ResponseEnvelope::Error {
            error,
            correlation_id: ctx.map(|c| c.correlation_id),
            event_id: ctx.map(|c| c.event_id),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success { .. })
    }
}

/// An asynchronous notification delivered to a subscriber: shares the
/// response envelope shape but also carries the originating event name
///.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub event: String,
    pub data: Value,
    pub context: EventContext,
}

impl Notification {
    pub fn from_envelope(envelope: &EventEnvelope) -> Self {
        Self {
            event: envelope.name.clone(),
            data: envelope.data.clone(),
            context: envelope.context.clone(),
        }
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
