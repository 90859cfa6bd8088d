// SPDX-License-Identifier: MIT

//! Permission profiles and the most-restrictive merge operator. Pure value objects — loading from YAML and the
//! per-agent map live in `ksi-daemon::permissions`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default universe of tool names used when a profile's `allowed` set is
/// `ALL` and a concrete subset check is needed (spawn validation). Mirrors
/// the original daemon's default Claude Code tool list.
pub const ALL_TOOLS: &[&str] = &[
    "Task", "Bash", "Glob", "Grep", "LS", "ExitPlanMode", "Read", "Edit", "MultiEdit", "Write",
    "NotebookRead", "NotebookEdit", "WebFetch", "TodoRead", "TodoWrite", "WebSearch",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Restricted,
    Standard,
    Trusted,
    Researcher,
    Custom,
}

/// `{allowed: set<string>|ALL, denied: set<string>}`.
///
/// `allowed = None` represents `ALL`. Effective = `(ALL or allowed) \ denied`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolPermissions {
    #[serde(default)]
    pub allowed: Option<BTreeSet<String>>,
    #[serde(default)]
    pub denied: BTreeSet<String>,
}

impl ToolPermissions {
    pub fn all() -> Self {
        Self { allowed: None, denied: BTreeSet::new() }
    }

    /// Effective allowed tools against the default universe (used by spawn
    /// validation, where `ALL` needs a concrete set to compare subsets).
    pub fn effective_allowed_tools(&self) -> BTreeSet<String> {
        let universe: BTreeSet<String> =
            self.allowed.clone().unwrap_or_else(|| ALL_TOOLS.iter().map(|s| s.to_string()).collect());
        universe.difference(&self.denied).cloned().collect()
    }

    /// O(1) membership check.
    pub fn is_allowed(&self, tool: &str) -> bool {
        if self.denied.contains(tool) {
            return false;
        }
        match &self.allowed {
            None => true,
            Some(allowed) => allowed.contains(tool),
        }
    }

    /// Most-restrictive merge: allowed-set intersection (`ALL` is the
    /// identity), denied-set union.
    pub fn merge(&self, other: &Self) -> Self {
        let allowed = match (&self.allowed, &other.allowed) {
            (None, None) => None,
            (None, Some(s)) | (Some(s), None) => Some(s.clone()),
            (Some(a), Some(b)) => Some(a.intersection(b).cloned().collect()),
        };
        let denied = self.denied.union(&other.denied).cloned().collect();
        Self { allowed, denied }
    }
}

/// `{sandbox_root, read_paths[], write_paths[], max_file_mb, max_total_mb,
/// allow_symlinks}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemPermissions {
    #[serde(default = "default_sandbox_root")]
    pub sandbox_root: String,
    #[serde(default = "default_workspace_paths")]
    pub read_paths: Vec<String>,
    #[serde(default = "default_workspace_paths")]
    pub write_paths: Vec<String>,
    #[serde(default = "default_max_file_mb")]
    pub max_file_mb: u64,
    #[serde(default = "default_max_total_mb")]
    pub max_total_mb: u64,
    #[serde(default)]
    pub allow_symlinks: bool,
}

fn default_sandbox_root() -> String {
    "./workspace".to_string()
}
fn default_workspace_paths() -> Vec<String> {
    vec!["./workspace".to_string()]
}
fn default_max_file_mb() -> u64 {
    10
}
fn default_max_total_mb() -> u64 {
    100
}

impl Default for FilesystemPermissions {
    fn default() -> Self {
        Self {
            sandbox_root: default_sandbox_root(),
            read_paths: default_workspace_paths(),
            write_paths: default_workspace_paths(),
            max_file_mb: default_max_file_mb(),
            max_total_mb: default_max_total_mb(),
            allow_symlinks: false,
        }
    }
}

impl FilesystemPermissions {
    /// Most-restrictive merge: path-list intersection, numeric minima,
    /// symlink-allowance AND.
    pub fn merge(&self, other: &Self) -> Self {
        let intersect = |a: &[String], b: &[String]| -> Vec<String> {
            let b: BTreeSet<&String> = b.iter().collect();
            a.iter().filter(|p| b.contains(p)).cloned().collect()
        };
        Self {
            sandbox_root: self.sandbox_root.clone(),
            read_paths: intersect(&self.read_paths, &other.read_paths),
            write_paths: intersect(&self.write_paths, &other.write_paths),
            max_file_mb: self.max_file_mb.min(other.max_file_mb),
            max_total_mb: self.max_total_mb.min(other.max_total_mb),
            allow_symlinks: self.allow_symlinks && other.allow_symlinks,
        }
    }
}

/// `{max_tokens_per_req, max_total_tokens, max_requests_per_min}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default = "default_max_tokens_per_req")]
    pub max_tokens_per_req: u64,
    #[serde(default = "default_max_total_tokens")]
    pub max_total_tokens: u64,
    #[serde(default = "default_max_requests_per_min")]
    pub max_requests_per_min: u32,
}

fn default_max_tokens_per_req() -> u64 {
    100_000
}
fn default_max_total_tokens() -> u64 {
    1_000_000
}
fn default_max_requests_per_min() -> u32 {
    60
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_tokens_per_req: default_max_tokens_per_req(),
            max_total_tokens: default_max_total_tokens(),
            max_requests_per_min: default_max_requests_per_min(),
        }
    }
}

impl ResourceLimits {
    /// Most-restrictive merge: numeric minima.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            max_tokens_per_req: self.max_tokens_per_req.min(other.max_tokens_per_req),
            max_total_tokens: self.max_total_tokens.min(other.max_total_tokens),
            max_requests_per_min: self.max_requests_per_min.min(other.max_requests_per_min),
        }
    }

    /// Pointwise `<=`, used by spawn validation.
    pub fn le(&self, other: &Self) -> bool {
        self.max_tokens_per_req <= other.max_tokens_per_req
            && self.max_total_tokens <= other.max_total_tokens
            && self.max_requests_per_min <= other.max_requests_per_min
    }
}

/// `{spawn_agents, agent_messaging, multi_agent_todo, network_access}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub spawn_agents: bool,
    #[serde(default)]
    pub agent_messaging: bool,
    #[serde(default)]
    pub multi_agent_todo: bool,
    #[serde(default)]
    pub network_access: bool,
}

impl Capabilities {
    /// Most-restrictive merge: logical AND.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            spawn_agents: self.spawn_agents && other.spawn_agents,
            agent_messaging: self.agent_messaging && other.agent_messaging,
            multi_agent_todo: self.multi_agent_todo && other.multi_agent_todo,
            network_access: self.network_access && other.network_access,
        }
    }

    /// True where every capability this profile grants, `other` also grants
    /// (used by spawn validation's "child.B => parent.B" rule).
    pub fn implied_by(&self, other: &Self) -> bool {
        (!self.spawn_agents || other.spawn_agents)
            && (!self.agent_messaging || other.agent_messaging)
            && (!self.multi_agent_todo || other.multi_agent_todo)
            && (!self.network_access || other.network_access)
    }
}

/// Complete, immutable permission set for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionProfile {
    pub level: PermissionLevel,
    #[serde(default)]
    pub tools: ToolPermissions,
    #[serde(default)]
    pub filesystem: FilesystemPermissions,
    #[serde(default)]
    pub resources: ResourceLimits,
    #[serde(default)]
    pub capabilities: Capabilities,
}

impl PermissionProfile {
    /// Most-restrictive merge `⊓`: associative, commutative, idempotent
    ///. The merged profile is always `Custom`.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            level: PermissionLevel::Custom,
            tools: self.tools.merge(&other.tools),
            filesystem: self.filesystem.merge(&other.filesystem),
            resources: self.resources.merge(&other.resources),
            capabilities: self.capabilities.merge(&other.capabilities),
        }
    }

    /// `parent.can_spawn(child)`: a spawned agent's effective permissions must
    /// never exceed its parent's — de-escalation only, never escalation.
    pub fn can_spawn(&self, child: &Self) -> bool {
        if !self.capabilities.spawn_agents {
            return false;
        }
        let parent_tools = self.tools.effective_allowed_tools();
        let child_tools = child.tools.effective_allowed_tools();
        if !child_tools.is_subset(&parent_tools) {
            return false;
        }
        if !child.resources.le(&self.resources) {
            return false;
        }
        if child.filesystem.max_file_mb > self.filesystem.max_file_mb
            || child.filesystem.max_total_mb > self.filesystem.max_total_mb
        {
            return false;
        }
        child.capabilities.implied_by(&self.capabilities)
    }
}

/// Overrides a spawn caller may supply on top of a base profile.
/// Applying these never bypasses `can_spawn` — it only shapes the derived
/// `Custom` profile that is then validated against the parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionOverrides {
    #[serde(default)]
    pub allowed_add: Vec<String>,
    #[serde(default)]
    pub allowed_remove: Vec<String>,
    #[serde(default)]
    pub denied_add: Vec<String>,
    #[serde(default)]
    pub read_paths_add: Vec<String>,
    #[serde(default)]
    pub write_paths_add: Vec<String>,
    #[serde(default)]
    pub resources_max_raise: Option<ResourceLimits>,
}

impl PermissionOverrides {
    /// Apply overrides to `base`, producing a derived `Custom` profile.
    /// Whether the result is actually grantable is decided separately by
    /// `parent.can_spawn(derived)`.
    pub fn apply(&self, base: &PermissionProfile) -> PermissionProfile {
        let mut tools = base.tools.clone();
        if let Some(allowed) = tools.allowed.as_mut() {
            for t in &self.allowed_add {
                allowed.insert(t.clone());
            }
            for t in &self.allowed_remove {
                allowed.remove(t);
            }
        }
        for t in &self.denied_add {
            tools.denied.insert(t.clone());
        }

        let mut filesystem = base.filesystem.clone();
        filesystem.read_paths.extend(self.read_paths_add.iter().cloned());
        filesystem.write_paths.extend(self.write_paths_add.iter().cloned());

        let resources = match &self.resources_max_raise {
            Some(raise) => ResourceLimits {
                max_tokens_per_req: base.resources.max_tokens_per_req.max(raise.max_tokens_per_req),
                max_total_tokens: base.resources.max_total_tokens.max(raise.max_total_tokens),
                max_requests_per_min: base
                    .resources
                    .max_requests_per_min
                    .max(raise.max_requests_per_min),
            },
            None => base.resources,
        };

        PermissionProfile {
            level: PermissionLevel::Custom,
            tools,
            filesystem,
            resources,
            capabilities: base.capabilities,
        }
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
