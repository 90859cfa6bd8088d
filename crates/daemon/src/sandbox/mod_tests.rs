// SPDX-License-Identifier: MIT

use super::*;
use ksi_core::{FakeClock, SessionId};

fn manager(dir: &tempfile::TempDir) -> SandboxManager {
    let clock = FakeClock::new();
    SandboxManager::new(dir.path().to_path_buf(), ksi_core::SharedClock::new(clock))
}

#[test]
fn isolated_sandbox_has_the_fixed_shape() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(&dir);
    let agent = AgentId::new();
    let metadata = mgr.create(agent, SandboxConfig { agent_id: agent, mode: SandboxMode::Isolated }).unwrap();

    let path = mgr.get(&agent).unwrap();
    assert!(path.join(WORKSPACE_DIR).is_dir());
    assert!(path.join(SHARED_DIR).is_dir());
    assert!(path.join(EXPORTS_DIR).is_dir());
    assert!(path.join(METADATA_FILE).is_file());
    assert_eq!(metadata.agent_id, agent);
}

#[test]
fn shared_sandbox_with_same_session_reuses_the_same_path() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(&dir);
    let session_id = SessionId::new();
    let a = AgentId::new();
    let b = AgentId::new();

    mgr.create(a, SandboxConfig { agent_id: a, mode: SandboxMode::Shared { session_id } }).unwrap();
    mgr.create(b, SandboxConfig { agent_id: b, mode: SandboxMode::Shared { session_id } }).unwrap();

    assert_eq!(mgr.get(&a), mgr.get(&b));
}

#[test]
fn nested_sandbox_links_parent_workspace_and_writes_access_marker() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(&dir);
    let parent = AgentId::new();
    mgr.create(parent, SandboxConfig { agent_id: parent, mode: SandboxMode::Isolated }).unwrap();

    let child = AgentId::new();
    mgr.create(
        child,
        SandboxConfig {
            agent_id: child,
            mode: SandboxMode::Nested { parent_agent_id: parent, parent_access: ParentAccess::ReadOnly },
        },
    )
    .unwrap();

    let child_path = mgr.get(&child).unwrap();
    let parent_path = mgr.get(&parent).unwrap();
    assert!(child_path.starts_with(&parent_path));
    assert!(child_path.join("parent").is_symlink());
    let marker = std::fs::read_to_string(child_path.join(PARENT_ACCESS_MARKER)).unwrap();
    assert_eq!(marker, "read_only");
}

#[test]
fn global_shared_resources_are_symlinked_into_every_sandbox() {
    let dir = tempfile::tempdir().unwrap();
    for resource in GLOBAL_SHARED_RESOURCES {
        std::fs::create_dir_all(dir.path().join("_shared").join(resource)).unwrap();
    }
    let mgr = manager(&dir);
    let agent = AgentId::new();
    mgr.create(agent, SandboxConfig { agent_id: agent, mode: SandboxMode::Isolated }).unwrap();

    let path = mgr.get(&agent).unwrap();
    for resource in GLOBAL_SHARED_RESOURCES {
        assert!(path.join(SHARED_DIR).join(resource).is_symlink());
    }
}

#[test]
fn remove_without_force_fails_while_nested_children_exist() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(&dir);
    let parent = AgentId::new();
    mgr.create(parent, SandboxConfig { agent_id: parent, mode: SandboxMode::Isolated }).unwrap();
    let child = AgentId::new();
    mgr.create(
        child,
        SandboxConfig {
            agent_id: child,
            mode: SandboxMode::Nested { parent_agent_id: parent, parent_access: ParentAccess::ReadWrite },
        },
    )
    .unwrap();

    let err = mgr.remove(&parent, false).unwrap_err();
    assert_eq!(err.code, ErrorCode::BadRequest);
    assert!(mgr.remove(&parent, true).is_ok());
}

#[test]
fn removing_isolated_sandbox_deletes_its_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(&dir);
    let agent = AgentId::new();
    mgr.create(agent, SandboxConfig { agent_id: agent, mode: SandboxMode::Isolated }).unwrap();
    let path = mgr.get(&agent).unwrap();

    mgr.remove(&agent, false).unwrap();
    assert!(!path.exists());
    assert!(mgr.get(&agent).is_none());
}

#[test]
fn removing_one_shared_tenant_keeps_the_directory_for_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(&dir);
    let session_id = SessionId::new();
    let a = AgentId::new();
    let b = AgentId::new();
    mgr.create(a, SandboxConfig { agent_id: a, mode: SandboxMode::Shared { session_id } }).unwrap();
    mgr.create(b, SandboxConfig { agent_id: b, mode: SandboxMode::Shared { session_id } }).unwrap();
    let path = mgr.get(&a).unwrap();

    mgr.remove(&a, false).unwrap();
    assert!(path.exists());
    mgr.remove(&b, false).unwrap();
    assert!(!path.exists());
}

#[test]
fn gc_orphans_removes_untracked_directories_older_than_the_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(&dir);
    let orphan_path = dir.path().join("agents").join("agt-orphan0000000000");
    std::fs::create_dir_all(&orphan_path).unwrap();
    let metadata = SandboxMetadata {
        sandbox_id: SandboxId::new(),
        agent_id: AgentId::new(),
        mode: SandboxMode::Isolated,
        created_at: 0,
        children: Vec::new(),
    };
    write_metadata(&orphan_path, &metadata).unwrap();

    let removed = mgr.gc_orphans(Duration::from_secs(1));
    assert_eq!(removed, 1);
    assert!(!orphan_path.exists());
}

#[test]
fn gc_orphans_leaves_directories_younger_than_the_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(&dir);
    let orphan_path = dir.path().join("agents").join("agt-recent000000000");
    std::fs::create_dir_all(&orphan_path).unwrap();
    let now_ns = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64;
    let metadata = SandboxMetadata {
        sandbox_id: SandboxId::new(),
        agent_id: AgentId::new(),
        mode: SandboxMode::Isolated,
        created_at: now_ns,
        children: Vec::new(),
    };
    write_metadata(&orphan_path, &metadata).unwrap();

    let removed = mgr.gc_orphans(Duration::from_secs(24 * 60 * 60));
    assert_eq!(removed, 0);
    assert!(orphan_path.exists());
}
