// SPDX-License-Identifier: MIT

//! Typed identifiers used throughout the event router, bus, supervisor,
//! permission manager and sandbox manager.

use crate::define_id;

define_id! {
    /// Unique per emission for the lifetime of the process.
    pub struct EventId("evt-");
}

define_id! {
    /// Unique per root event; every descendant event shares it.
    pub struct CorrelationId("cor-");
}

define_id! {
    /// Process-unique connection identifier.
    pub struct ConnId("cnn-");
}

define_id! {
    /// Globally unique agent identifier, assigned at spawn.
    pub struct AgentId("agt-");
}

define_id! {
    /// Session identifier shared by agents with a `SHARED` sandbox.
    pub struct SessionId("ses-");
}

define_id! {
    /// Identifies a subprocess spawn request.
    pub struct RequestId("req-");
}

define_id! {
    /// Identifies an append-only conversation log.
    pub struct ConversationId("cvn-");
}

define_id! {
    /// Identifies one recorded LLM response within a conversation.
    pub struct ResponseId("rsp-");
}

define_id! {
    /// Identifies a sandbox directory tree; its identity
    /// is really its path, but handlers address it by this short id.
    pub struct SandboxId("sbx-");
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
