use super::*;
use crate::permission::{Capabilities, FilesystemPermissions, PermissionLevel, ResourceLimits, ToolPermissions};

fn profile() -> PermissionProfile {
    PermissionProfile {
        level: PermissionLevel::Standard,
        tools: ToolPermissions::all(),
        filesystem: FilesystemPermissions::default(),
        resources: ResourceLimits::default(),
        capabilities: Capabilities::default(),
    }
}

fn agent(state: AgentState) -> Agent {
    Agent {
        agent_id: AgentId::new(),
        profile_name: "standard".to_string(),
        permissions: profile(),
        sandbox_id: SandboxId::new(),
        parent_agent_id: None,
        session_id: None,
        state,
    }
}

#[test]
fn registering_may_advance_to_ready_or_die() {
    assert!(AgentState::Registering.can_transition_to(AgentState::Ready));
    assert!(AgentState::Registering.can_transition_to(AgentState::Dead));
    assert!(!AgentState::Registering.can_transition_to(AgentState::Busy));
}

#[test]
fn dead_is_terminal() {
    assert!(!AgentState::Dead.can_transition_to(AgentState::Ready));
    assert!(!AgentState::Dead.can_transition_to(AgentState::Busy));
}

#[test]
fn ready_and_busy_cycle_freely() {
    assert!(AgentState::Ready.can_transition_to(AgentState::Busy));
    assert!(AgentState::Busy.can_transition_to(AgentState::Ready));
}

#[test]
fn is_terminal_reflects_dead_state_only() {
    assert!(agent(AgentState::Dead).is_terminal());
    assert!(!agent(AgentState::Ready).is_terminal());
}

#[test]
fn agent_round_trips_through_json() {
    let a = agent(AgentState::Ready);
    let json = serde_json::to_string(&a).unwrap();
    let back: Agent = serde_json::from_str(&json).unwrap();
    assert_eq!(a.agent_id, back.agent_id);
    assert_eq!(back.state, AgentState::Ready);
}
