// SPDX-License-Identifier: MIT

//! Agent Registry & Session Index: the
//! `agent_id -> Agent` map, the parent-child graph permission checks use to validate spawns
//! against, persistent connection binding, capability lookup for
//! `TASK_ASSIGNMENT`, and the append-only conversation index writer.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::warn;

use ksi_core::{Agent, AgentId, AgentState, ConversationId, ErrorCode, KsiError, ResponseId};

use crate::bus::CapabilityResolver;
use crate::connection::ConnectionRef;

struct Record {
    agent: Agent,
    connection: Option<ConnectionRef>,
    capabilities: BTreeSet<String>,
}

/// Owns agent lifecycle state and the connection binding that lets
/// `agent:connect`/`agent:disconnect` pause delivery rather than terminate
/// the agent.
pub struct AgentRegistry {
    agents: RwLock<HashMap<AgentId, Record>>,
    children: RwLock<HashMap<AgentId, HashSet<AgentId>>>,
    conversation_tx: mpsc::Sender<(ConversationId, ResponseId)>,
}

impl AgentRegistry {
    pub fn new(conversations_dir: PathBuf) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(256);
        spawn_conversation_writer(conversations_dir, rx);
        Arc::new(Self { agents: RwLock::new(HashMap::new()), children: RwLock::new(HashMap::new()), conversation_tx: tx })
    }

    /// Register a newly spawned agent.
    pub fn register(&self, agent: Agent) {
        if let Some(parent) = agent.parent_agent_id {
            self.children.write().entry(parent).or_default().insert(agent.agent_id);
        }
        self.agents.write().insert(agent.agent_id, Record { agent, connection: None, capabilities: BTreeSet::new() });
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<Agent> {
        self.agents.read().get(agent_id).map(|r| r.agent.clone())
    }

    pub fn list(&self) -> Vec<Agent> {
        self.agents.read().values().map(|r| r.agent.clone()).collect()
    }

    pub fn children_of(&self, agent_id: &AgentId) -> Vec<AgentId> {
        self.children.read().get(agent_id).map(|c| c.iter().copied().collect()).unwrap_or_default()
    }

    /// Transition an agent's lifecycle state, enforcing
    /// [`AgentState::can_transition_to`].
    pub fn set_state(&self, agent_id: &AgentId, next: AgentState) -> Result<(), KsiError> {
        let mut agents = self.agents.write();
        let record = agents
            .get_mut(agent_id)
            .ok_or_else(|| KsiError::not_found(format!("agent {agent_id} not found")))?;
        if !record.agent.state.can_transition_to(next) {
            return Err(KsiError::new(
                ErrorCode::BadRequest,
                format!("illegal agent state transition {:?} -> {:?}", record.agent.state, next),
            ));
        }
        record.agent.state = next;
        Ok(())
    }

    /// `agent:terminate` / explicit removal.
    pub fn remove(&self, agent_id: &AgentId) -> Option<Agent> {
        let removed = self.agents.write().remove(agent_id).map(|r| r.agent);
        self.children.write().remove(agent_id);
        if let Some(agent) = &removed {
            if let Some(parent) = agent.parent_agent_id {
                if let Some(siblings) = self.children.write().get_mut(&parent) {
                    siblings.remove(agent_id);
                }
            }
        }
        removed
    }

    /// Bind a live connection to an agent.
    pub fn bind_connection(&self, agent_id: &AgentId, connection: ConnectionRef) -> Result<(), KsiError> {
        connection.bind_agent(*agent_id);
        let mut agents = self.agents.write();
        let record = agents
            .get_mut(agent_id)
            .ok_or_else(|| KsiError::not_found(format!("agent {agent_id} not found")))?;
        record.connection = Some(connection);
        Ok(())
    }

    /// Unbind on disconnect. Does not terminate the agent or clear its
    /// state — only pauses delivery, enabling offline queueing.
    pub fn unbind_connection(&self, agent_id: &AgentId) {
        if let Some(record) = self.agents.write().get_mut(agent_id) {
            record.connection = None;
        }
    }

    pub fn connection_of(&self, agent_id: &AgentId) -> Option<ConnectionRef> {
        self.agents.read().get(agent_id).and_then(|r| r.connection.clone())
    }

    /// Record which capability tags an agent advertised at spawn, used by
    /// `TASK_ASSIGNMENT` resolution.
    pub fn set_capabilities(&self, agent_id: &AgentId, capabilities: BTreeSet<String>) {
        if let Some(record) = self.agents.write().get_mut(agent_id) {
            record.capabilities = capabilities;
        }
    }

    /// Find one live, connected agent advertising every capability in
    /// `required`. Returns `None` if none qualify.
    pub fn agent_with_capabilities(&self, required: &[String]) -> Option<AgentId> {
        let agents = self.agents.read();
        agents
            .iter()
            .find(|(_, record)| {
                record.connection.is_some()
                    && record.agent.state != AgentState::Dead
                    && required.iter().all(|c| record.capabilities.contains(c))
            })
            .map(|(id, _)| *id)
    }

    /// Append one `response_id` to `conversations/<conversation_id>.log`
    /// via the dedicated writer task.
    pub fn record_response(&self, conversation_id: ConversationId, response_id: ResponseId) {
        if self.conversation_tx.try_send((conversation_id, response_id)).is_err() {
            warn!(%conversation_id, "conversation index writer backlogged, dropping one append");
        }
    }
}

impl CapabilityResolver for AgentRegistry {
    fn resolve(&self, required_capabilities: &[String]) -> Option<AgentId> {
        self.agent_with_capabilities(required_capabilities)
    }

    fn connection_for(&self, agent_id: &AgentId) -> Option<ConnectionRef> {
        self.connection_of(agent_id)
    }
}

fn spawn_conversation_writer(
    conversations_dir: PathBuf,
    mut rx: mpsc::Receiver<(ConversationId, ResponseId)>,
) {
    tokio::spawn(async move {
        if let Err(e) = tokio::fs::create_dir_all(&conversations_dir).await {
            tracing::error!(error = %e, "failed to create conversations directory");
        }
        let mut open_files: HashMap<ConversationId, tokio::fs::File> = HashMap::new();
        while let Some((conversation_id, response_id)) = rx.recv().await {
            let file = match open_files.get_mut(&conversation_id) {
                Some(f) => f,
                None => {
                    let path = conversations_dir.join(format!("{conversation_id}.log"));
                    match tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await {
                        Ok(f) => open_files.entry(conversation_id).or_insert(f),
                        Err(e) => {
                            warn!(error = %e, path = %path.display(), "failed to open conversation log");
                            continue;
                        }
                    }
                }
            };
            if let Err(e) = file.write_all(format!("{response_id}\n").as_bytes()).await {
                warn!(error = %e, "conversation index append failed");
            }
        }
    });
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
