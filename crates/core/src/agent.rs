// SPDX-License-Identifier: MIT

//! Agent record. Owned by the Agent Registry in `ksi-daemon`;
//! this module only defines the value shape.

use crate::ids::{AgentId, SandboxId, SessionId};
use crate::permission::PermissionProfile;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Registering,
    Ready,
    Busy,
    Terminating,
    Dead,
}

impl AgentState {
    /// Legal state transitions, enforced by the registry on every update.
    pub fn can_transition_to(self, next: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, next),
            (Registering, Ready)
                | (Registering, Dead)
                | (Ready, Busy)
                | (Ready, Terminating)
                | (Ready, Dead)
                | (Busy, Ready)
                | (Busy, Terminating)
                | (Busy, Dead)
                | (Terminating, Dead)
        )
    }
}

/// A registered agent: permissions fixed at spawn time, sandbox and process
/// lifecycle managed elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    pub profile_name: String,
    pub permissions: PermissionProfile,
    pub sandbox_id: SandboxId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub state: AgentState,
}

impl Agent {
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, AgentState::Dead)
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
