use super::*;

fn tools(allowed: Option<&[&str]>, denied: &[&str]) -> ToolPermissions {
    ToolPermissions {
        allowed: allowed.map(|a| a.iter().map(|s| s.to_string()).collect()),
        denied: denied.iter().map(|s| s.to_string()).collect(),
    }
}

fn profile(tools: ToolPermissions, spawn_agents: bool) -> PermissionProfile {
    PermissionProfile {
        level: PermissionLevel::Standard,
        tools,
        filesystem: FilesystemPermissions::default(),
        resources: ResourceLimits::default(),
        capabilities: Capabilities { spawn_agents, ..Capabilities::default() },
    }
}

#[test]
fn tool_permissions_all_allows_everything_not_denied() {
    let t = tools(None, &["Bash"]);
    assert!(t.is_allowed("Read"));
    assert!(!t.is_allowed("Bash"));
}

#[test]
fn tool_permissions_merge_intersects_allowed_and_unions_denied() {
    let a = tools(Some(&["Read", "Write", "Bash"]), &["Bash"]);
    let b = tools(Some(&["Read", "Grep"]), &["Grep"]);
    let merged = a.merge(&b);
    let allowed = merged.allowed.unwrap();
    assert_eq!(allowed, ["Read"].iter().map(|s| s.to_string()).collect());
    assert!(merged.denied.contains("Bash"));
    assert!(merged.denied.contains("Grep"));
}

#[test]
fn tool_permissions_merge_with_all_is_identity() {
    let all = ToolPermissions::all();
    let restricted = tools(Some(&["Read"]), &[]);
    assert_eq!(all.merge(&restricted), restricted.merge(&all));
    assert_eq!(all.merge(&restricted).allowed, restricted.allowed);
}

#[test]
fn permission_profile_merge_is_commutative() {
    let a = profile(tools(Some(&["Read", "Write"]), &[]), true);
    let b = profile(tools(Some(&["Write", "Bash"]), &["Bash"]), false);
    assert_eq!(a.merge(&b), b.merge(&a));
}

#[test]
fn permission_profile_merge_is_idempotent() {
    let a = profile(tools(Some(&["Read", "Write"]), &["Bash"]), true);
    assert_eq!(a.merge(&a), a);
}

#[test]
fn permission_profile_merge_is_associative() {
    let a = profile(tools(Some(&["Read", "Write", "Bash", "Grep"]), &[]), true);
    let b = profile(tools(Some(&["Read", "Write", "Bash"]), &["Bash"]), true);
    let c = profile(tools(Some(&["Read", "Grep"]), &[]), false);

    let left = a.merge(&b).merge(&c);
    let right = a.merge(&b.merge(&c));
    assert_eq!(left, right);
}

#[test]
fn resource_limits_merge_takes_minimum() {
    let a = ResourceLimits { max_tokens_per_req: 100, max_total_tokens: 1000, max_requests_per_min: 10 };
    let b = ResourceLimits { max_tokens_per_req: 50, max_total_tokens: 2000, max_requests_per_min: 20 };
    let merged = a.merge(&b);
    assert_eq!(merged.max_tokens_per_req, 50);
    assert_eq!(merged.max_total_tokens, 1000);
    assert_eq!(merged.max_requests_per_min, 10);
}

#[test]
fn can_spawn_rejects_when_parent_lacks_spawn_capability() {
    let parent = profile(ToolPermissions::all(), false);
    let child = profile(ToolPermissions::all(), false);
    assert!(!parent.can_spawn(&child));
}

#[test]
fn can_spawn_rejects_tool_escalation() {
    let parent = profile(tools(Some(&["Read"]), &[]), true);
    let child = profile(tools(Some(&["Read", "Bash"]), &[]), false);
    assert!(!parent.can_spawn(&child));
}

#[test]
fn can_spawn_rejects_capability_escalation() {
    let mut parent = profile(ToolPermissions::all(), true);
    parent.capabilities.network_access = false;
    let mut child = profile(ToolPermissions::all(), false);
    child.capabilities.network_access = true;
    assert!(!parent.can_spawn(&child));
}

#[test]
fn can_spawn_rejects_resource_escalation() {
    let parent = profile(ToolPermissions::all(), true);
    let mut child = profile(ToolPermissions::all(), false);
    child.resources.max_tokens_per_req = parent.resources.max_tokens_per_req + 1;
    assert!(!parent.can_spawn(&child));
}

#[test]
fn can_spawn_accepts_strictly_narrower_child() {
    let parent = profile(ToolPermissions::all(), true);
    let mut child = profile(tools(Some(&["Read"]), &[]), false);
    child.resources.max_tokens_per_req = parent.resources.max_tokens_per_req / 2;
    assert!(parent.can_spawn(&child));
}

#[test]
fn overrides_apply_extends_allowed_and_denied_sets() {
    let base = profile(tools(Some(&["Read", "Bash"]), &[]), true);
    let overrides = PermissionOverrides {
        allowed_add: vec!["Grep".to_string()],
        allowed_remove: vec!["Bash".to_string()],
        denied_add: vec!["WebFetch".to_string()],
        ..Default::default()
    };
    let derived = overrides.apply(&base);
    let allowed = derived.tools.allowed.unwrap();
    assert!(allowed.contains("Grep"));
    assert!(!allowed.contains("Bash"));
    assert!(derived.tools.denied.contains("WebFetch"));
    assert_eq!(derived.level, PermissionLevel::Custom);
}

#[test]
fn overrides_that_escalate_are_still_rejected_by_can_spawn() {
    let parent = profile(tools(Some(&["Read"]), &[]), true);
    let overrides = PermissionOverrides { allowed_add: vec!["Bash".to_string()], ..Default::default() };
    let derived = overrides.apply(&parent);
    assert!(!parent.can_spawn(&derived));
}
