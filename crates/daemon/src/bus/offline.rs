// SPDX-License-Identifier: MIT

//! Per-agent offline queue:
//! bounded FIFO retained for a disconnected agent, delivered in order on
//! reconnect, drop-oldest on overflow with a counter.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use ksi_core::{AgentId, Notification};

#[derive(Default)]
struct AgentQueue {
    messages: VecDeque<Notification>,
    dropped: u64,
}

pub struct OfflineQueues {
    queues: RwLock<HashMap<AgentId, AgentQueue>>,
    capacity: usize,
}

impl OfflineQueues {
    pub fn new(capacity: usize) -> Self {
        Self { queues: RwLock::new(HashMap::new()), capacity }
    }

    /// Enqueue for a disconnected agent; drops the oldest message and
    /// increments the drop counter if at capacity.
    pub fn enqueue(&self, agent_id: AgentId, notification: Notification) {
        let mut queues = self.queues.write();
        let queue = queues.entry(agent_id).or_default();
        if queue.messages.len() >= self.capacity {
            queue.messages.pop_front();
            queue.dropped += 1;
        }
        queue.messages.push_back(notification);
    }

    /// Drain everything queued for `agent_id`, in FIFO order, clearing the
    /// queue (delivered on `agent:connect`).
    pub fn drain(&self, agent_id: &AgentId) -> Vec<Notification> {
        let mut queues = self.queues.write();
        match queues.get_mut(agent_id) {
            Some(queue) => queue.messages.drain(..).collect(),
            None => Vec::new(),
        }
    }

    pub fn dropped_count(&self, agent_id: &AgentId) -> u64 {
        self.queues.read().get(agent_id).map(|q| q.dropped).unwrap_or(0)
    }

    pub fn queued_len(&self, agent_id: &AgentId) -> usize {
        self.queues.read().get(agent_id).map(|q| q.messages.len()).unwrap_or(0)
    }

    pub fn total_queued(&self) -> usize {
        self.queues.read().values().map(|q| q.messages.len()).sum()
    }

    pub fn clear_all(&self) {
        self.queues.write().clear();
    }
}

#[cfg(test)]
#[path = "offline_tests.rs"]
mod tests;
