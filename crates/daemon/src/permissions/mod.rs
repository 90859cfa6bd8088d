// SPDX-License-Identifier: MIT

//! Permission Manager: loads permission profiles from YAML,
//! assigns one immutably to each agent at spawn, and validates spawn
//! requests under the monotone de-escalation rule — grounded in
//! `ksi_common/agent_permissions.py`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use ksi_core::{
    AgentId, ErrorCode, KsiError, PermissionLevel, PermissionOverrides, PermissionProfile,
};

/// Profile map is copy-on-write: loaded once at startup, replaced wholesale
/// on `permission:reload` rather than mutated in place. Per-agent
/// assignments are immutable after spawn.
pub struct PermissionManager {
    profiles: RwLock<HashMap<PermissionLevel, PermissionProfile>>,
    agents: RwLock<HashMap<AgentId, PermissionProfile>>,
}

impl PermissionManager {
    pub fn new() -> Self {
        Self { profiles: RwLock::new(HashMap::new()), agents: RwLock::new(HashMap::new()) }
    }

    /// Load every `*.yaml` file in `profiles_dir`, keyed by the `level`
    /// field inside it. Missing directory is not an error; a malformed file is logged and skipped so one bad file
    /// doesn't prevent startup.
    pub fn load_profiles(profiles_dir: &Path) -> Self {
        let manager = Self::new();
        let entries = match std::fs::read_dir(profiles_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %profiles_dir.display(), error = %e, "permission profiles directory unavailable");
                return manager;
            }
        };

        let mut profiles = HashMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            match std::fs::read_to_string(&path).map(|s| serde_yaml::from_str::<PermissionProfile>(&s)) {
                Ok(Ok(profile)) => {
                    tracing::info!(level = ?profile.level, path = %path.display(), "loaded permission profile");
                    profiles.insert(profile.level, profile);
                }
                Ok(Err(e)) => tracing::error!(path = %path.display(), error = %e, "invalid permission profile"),
                Err(e) => tracing::error!(path = %path.display(), error = %e, "failed to read permission profile"),
            }
        }
        *manager.profiles.write() = profiles;
        manager
    }

    pub fn profile(&self, level: PermissionLevel) -> Option<PermissionProfile> {
        self.profiles.read().get(&level).cloned()
    }

    pub fn list_profiles(&self) -> Vec<PermissionProfile> {
        self.profiles.read().values().cloned().collect()
    }

    pub fn agent_profile(&self, agent_id: &AgentId) -> Option<PermissionProfile> {
        self.agents.read().get(agent_id).cloned()
    }

    /// Assign an immutable profile to a newly spawned agent.
    pub fn assign(&self, agent_id: AgentId, profile: PermissionProfile) {
        self.agents.write().insert(agent_id, profile);
    }

    pub fn remove(&self, agent_id: &AgentId) {
        self.agents.write().remove(agent_id);
    }

    /// `parent.can_spawn(overrides applied to base)`. Returns
    /// the derived profile on success so the caller can assign it in the
    /// same step.
    pub fn validate_spawn(
        &self,
        parent_id: &AgentId,
        base_level: PermissionLevel,
        overrides: &PermissionOverrides,
    ) -> Result<PermissionProfile, KsiError> {
        let parent = self
            .agent_profile(parent_id)
            .ok_or_else(|| KsiError::not_found(format!("parent agent {parent_id} has no assigned permissions")))?;
        let base = self
            .profile(base_level)
            .ok_or_else(|| KsiError::not_found(format!("no permission profile for level {base_level:?}")))?;
        let derived = overrides.apply(&base);

        if parent.can_spawn(&derived) {
            Ok(derived)
        } else {
            Err(KsiError::permission_denied("child permissions exceed what the parent may grant"))
        }
    }
}

impl Default for PermissionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve `path` (relative to `sandbox_dir` if not absolute) and check it
/// falls within one of `allowed_paths` (also resolved relative to
/// `sandbox_dir`). Symlinks are rejected unless `allow_symlinks`.
pub fn validate_path(
    path: &Path,
    sandbox_dir: &Path,
    allowed_paths: &[String],
    allow_symlinks: bool,
) -> Result<PathBuf, KsiError> {
    if !allow_symlinks && path.is_symlink() {
        return Err(KsiError::permission_denied("symlinks are not permitted by this agent's filesystem permissions"));
    }

    let absolute = if path.is_absolute() { path.to_path_buf() } else { sandbox_dir.join(path) };
    let resolved = normalize(&absolute);

    for allowed in allowed_paths {
        let allowed_path = Path::new(allowed);
        let allowed_absolute = if allowed_path.is_absolute() { allowed_path.to_path_buf() } else { sandbox_dir.join(allowed_path) };
        let allowed_resolved = normalize(&allowed_absolute);
        if resolved.starts_with(&allowed_resolved) {
            return Ok(resolved);
        }
    }

    Err(KsiError::new(ErrorCode::PermissionDenied, "path is outside the agent's allowed directories")
        .with_details(resolved.display().to_string()))
}

/// Lexically resolves `..`/`.` without requiring the path to exist (unlike
/// `Path::canonicalize`, which additionally requires the target to be
/// present on disk and would resolve through symlinks we want to reject
/// explicitly above).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
