// SPDX-License-Identifier: MIT

//! Sandbox value types. Pure data — directory creation,
//! symlink installation, and orphan GC live in `ksi-daemon::sandbox`.

use crate::ids::{AgentId, SandboxId, SessionId};
use serde::{Deserialize, Serialize};

/// Fixed subdirectory names under a sandbox root.
pub const WORKSPACE_DIR: &str = "workspace";
pub const SHARED_DIR: &str = "shared";
pub const EXPORTS_DIR: &str = "exports";
pub const AGENT_STATE_DIR: &str = ".agent";
pub const METADATA_FILE: &str = ".sandbox_metadata.json";
pub const PARENT_ACCESS_MARKER: &str = ".parent_access";

/// Global shared-resource names installed as symlinks into every sandbox's
/// `shared/` directory.
pub const GLOBAL_SHARED_RESOURCES: &[&str] = &["knowledge", "templates"];

/// Default orphan-GC age threshold.
pub const DEFAULT_ORPHAN_AGE_SECS: u64 = 24 * 60 * 60;

/// How a sandbox's location and lifetime relate to other sandboxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "UPPERCASE")]
pub enum SandboxMode {
    /// `agents/<agent_id>/` — owned by exactly one agent.
    Isolated,
    /// `shared/<session_id>/` — shared by every agent in a session;
    /// `sandbox:create` with an identical `(session_id, SHARED)` pair
    /// returns the same path.
    Shared { session_id: SessionId },
    /// `<parent_sandbox>/nested/<agent_id>/` — a child sandbox rooted
    /// inside its parent's tree, with read-only or read-write access to
    /// the parent's workspace.
    Nested { parent_agent_id: AgentId, parent_access: ParentAccess },
}

/// Access level granted to a nested sandbox over its parent's workspace,
/// recorded in the `.parent_access` marker file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentAccess {
    ReadOnly,
    ReadWrite,
}

impl ParentAccess {
    pub fn as_marker_str(&self) -> &'static str {
        match self {
            ParentAccess::ReadOnly => "read_only",
            ParentAccess::ReadWrite => "read_write",
        }
    }
}

/// Request describing a sandbox to find-or-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    pub agent_id: AgentId,
    pub mode: SandboxMode,
}

/// Persisted alongside a sandbox as `.sandbox_metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxMetadata {
    pub sandbox_id: SandboxId,
    pub agent_id: AgentId,
    #[serde(flatten)]
    pub mode: SandboxMode,
    /// UTC nanoseconds.
    pub created_at: u64,
    /// Agent ids of live nested child sandboxes; removal without `force`
    /// must fail while this is non-empty.
    #[serde(default)]
    pub children: Vec<AgentId>,
}

impl SandboxMetadata {
    pub fn has_live_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
