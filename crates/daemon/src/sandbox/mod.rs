// SPDX-License-Identifier: MIT

//! Sandbox Manager: creates and tears down the per-agent
//! directory tree, installs global shared-resource symlinks, and garbage
//! collects orphaned sandboxes — grounded in
//! `ksi_common/sandbox_manager.py`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use ksi_core::{
    AgentId, ErrorCode, KsiError, ParentAccess, SandboxConfig, SandboxId, SandboxMetadata,
    SandboxMode, AGENT_STATE_DIR, EXPORTS_DIR, GLOBAL_SHARED_RESOURCES, METADATA_FILE,
    PARENT_ACCESS_MARKER, SHARED_DIR, WORKSPACE_DIR,
};

struct Entry {
    sandbox_id: SandboxId,
    path: PathBuf,
    mode: SandboxMode,
    /// Live tenants for a `SHARED` sandbox; removal is reference-counted
    ///.
    tenants: Vec<AgentId>,
}

/// `root` is the configured sandbox directory.
pub struct SandboxManager {
    root: PathBuf,
    clock: ksi_core::SharedClock,
    entries: RwLock<HashMap<AgentId, Entry>>,
}

impl SandboxManager {
    pub fn new(root: PathBuf, clock: ksi_core::SharedClock) -> Self {
        Self { root, clock, entries: RwLock::new(HashMap::new()) }
    }

    fn agents_root(&self) -> PathBuf {
        self.root.join("agents")
    }

    fn shared_root(&self) -> PathBuf {
        self.root.join("shared")
    }

    fn global_shared_root(&self) -> PathBuf {
        self.root.join("_shared")
    }

    fn sandbox_path_for(&self, agent_id: &AgentId, config: &SandboxConfig) -> Result<PathBuf, KsiError> {
        match &config.mode {
            SandboxMode::Isolated => Ok(self.agents_root().join(agent_id.as_str())),
            SandboxMode::Shared { session_id } => Ok(self.shared_root().join(session_id.as_str())),
            SandboxMode::Nested { parent_agent_id, .. } => {
                let entries = self.entries.read();
                let parent = entries
                    .get(parent_agent_id)
                    .ok_or_else(|| KsiError::not_found(format!("parent sandbox for agent {parent_agent_id} not found")))?;
                Ok(parent.path.join("nested").join(agent_id.as_str()))
            }
        }
    }

    /// Find-or-create` returns the same path).
    pub fn create(&self, agent_id: AgentId, config: SandboxConfig) -> Result<SandboxMetadata, KsiError> {
        if let SandboxMode::Shared { session_id } = &config.mode {
            let existing = self.entries.read().values().find_map(|e| {
                matches!(&e.mode, SandboxMode::Shared { session_id: s } if s == session_id)
                    .then(|| (e.sandbox_id, e.path.clone()))
            });
            if let Some((sandbox_id, path)) = existing {
                self.entries.write().insert(
                    agent_id,
                    Entry { sandbox_id, path, mode: config.mode.clone(), tenants: Vec::new() },
                );
                return Ok(SandboxMetadata {
                    sandbox_id,
                    agent_id,
                    mode: config.mode,
                    created_at: self.clock.epoch_ns(),
                    children: Vec::new(),
                });
            }
        }

        let path = self.sandbox_path_for(&agent_id, &config)?;
        self.create_shape(&path).map_err(io_error)?;
        self.install_shared_symlinks(&path).map_err(io_error)?;

        if let SandboxMode::Nested { parent_agent_id, parent_access } = &config.mode {
            let parent_workspace = {
                let entries = self.entries.read();
                entries.get(parent_agent_id).map(|p| p.path.join(WORKSPACE_DIR))
            };
            if let Some(parent_workspace) = parent_workspace {
                install_parent_link(&path, &parent_workspace, *parent_access).map_err(io_error)?;
            }
            let parent_path = {
                let mut entries = self.entries.write();
                entries.get_mut(parent_agent_id).map(|parent| {
                    parent.tenants.push(agent_id);
                    parent.path.clone()
                })
            };
            if let Some(parent_path) = parent_path {
                record_child(&parent_path, agent_id);
            }
        }

        let sandbox_id = SandboxId::new();
        let metadata = SandboxMetadata {
            sandbox_id,
            agent_id,
            mode: config.mode.clone(),
            created_at: self.clock.epoch_ns(),
            children: Vec::new(),
        };
        write_metadata(&path, &metadata).map_err(io_error)?;

        self.entries.write().insert(
            agent_id,
            Entry { sandbox_id, path, mode: config.mode, tenants: Vec::new() },
        );

        Ok(metadata)
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<PathBuf> {
        self.entries.read().get(agent_id).map(|e| e.path.clone())
    }

    pub fn list(&self) -> Vec<(AgentId, PathBuf)> {
        self.entries.read().iter().map(|(id, e)| (*id, e.path.clone())).collect()
    }

    /// Nested children block removal unless `force`; `SHARED` only
    /// untracks unless it was the last tenant, in which case the
    /// directory is also removed.
    pub fn remove(&self, agent_id: &AgentId, force: bool) -> Result<(), KsiError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get(agent_id)
            .ok_or_else(|| KsiError::not_found(format!("sandbox for agent {agent_id} not found")))?;

        if !force && !entry.tenants.is_empty() {
            return Err(KsiError::new(ErrorCode::BadRequest, "sandbox has live nested children"));
        }

        match &entry.mode {
            SandboxMode::Shared { .. } => {
                let path = entry.path.clone();
                entries.remove(agent_id);
                let still_tenanted = entries.values().any(|e| e.path == path);
                if !still_tenanted {
                    let _ = std::fs::remove_dir_all(&path);
                }
            }
            _ => {
                let path = entry.path.clone();
                entries.remove(agent_id);
                std::fs::remove_dir_all(&path).map_err(io_error)?;
            }
        }
        Ok(())
    }

    /// Scan `agents/` for directories not in `entries`; remove ones older
    /// than `max_age` per their `.sandbox_metadata.json`. Returns the number removed.
    pub fn gc_orphans(&self, max_age: Duration) -> usize {
        let agents_root = self.agents_root();
        let Ok(read_dir) = std::fs::read_dir(&agents_root) else {
            return 0;
        };

        let tracked: std::collections::HashSet<PathBuf> =
            self.entries.read().values().map(|e| e.path.clone()).collect();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64;

        let mut removed = 0;
        for entry in read_dir.flatten() {
            let path = entry.path();
            if !path.is_dir() || tracked.contains(&path) {
                continue;
            }
            let metadata_path = path.join(METADATA_FILE);
            let Ok(raw) = std::fs::read_to_string(&metadata_path) else { continue };
            let Ok(metadata) = serde_json::from_str::<SandboxMetadata>(&raw) else { continue };
            let age_ns = now.saturating_sub(metadata.created_at);
            if age_ns >= max_age.as_nanos() as u64 {
                if std::fs::remove_dir_all(&path).is_ok() {
                    removed += 1;
                    tracing::info!(path = %path.display(), "removed orphaned sandbox");
                }
            }
        }
        removed
    }

    fn create_shape(&self, path: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(path.join(WORKSPACE_DIR))?;
        std::fs::create_dir_all(path.join(SHARED_DIR))?;
        std::fs::create_dir_all(path.join(EXPORTS_DIR))?;
        std::fs::create_dir_all(path.join(AGENT_STATE_DIR))?;
        Ok(())
    }

    fn install_shared_symlinks(&self, path: &Path) -> std::io::Result<()> {
        let global_shared = self.global_shared_root();
        let shared_dir = path.join(SHARED_DIR);
        for resource in GLOBAL_SHARED_RESOURCES {
            let target = global_shared.join(resource);
            let link = shared_dir.join(resource);
            if target.exists() && !link.exists() {
                symlink(&target, &link)?;
            }
        }
        Ok(())
    }
}

fn install_parent_link(path: &Path, parent_workspace: &Path, access: ParentAccess) -> std::io::Result<()> {
    let link = path.join("parent");
    if !link.exists() {
        symlink(parent_workspace, &link)?;
        std::fs::write(path.join(PARENT_ACCESS_MARKER), access.as_marker_str())?;
    }
    Ok(())
}

fn write_metadata(path: &Path, metadata: &SandboxMetadata) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(metadata).unwrap_or_default();
    std::fs::write(path.join(METADATA_FILE), json)
}

/// Keep a nested child's id in its parent's persisted metadata so
/// `.sandbox_metadata.json` alone (e.g. read by orphan GC after a daemon
/// restart) reflects live children without consulting in-memory state.
fn record_child(parent_path: &Path, child: AgentId) {
    let metadata_path = parent_path.join(METADATA_FILE);
    let Ok(raw) = std::fs::read_to_string(&metadata_path) else { return };
    let Ok(mut metadata) = serde_json::from_str::<SandboxMetadata>(&raw) else { return };
    if !metadata.children.contains(&child) {
        metadata.children.push(child);
    }
    let _ = write_metadata(parent_path, &metadata);
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

fn io_error(e: std::io::Error) -> KsiError {
    KsiError::new(ErrorCode::ConnectionError, "sandbox filesystem operation failed").with_details(e.to_string())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
