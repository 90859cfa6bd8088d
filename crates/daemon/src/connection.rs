// SPDX-License-Identifier: MIT

//! Live connection state shared between the reader task, the writer task,
//! and every subsystem that can push an async notification onto a
//! connection (bus fan-out, completion callbacks). Writes on a single
//! connection occur strictly in enqueue order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use ksi_core::{AgentId, ConnId};
use ksi_wire::ServerMessage;

/// What happens to a connection whose write queue is full. Configurable per connection; defaults to drop-oldest so a
/// slow broadcast subscriber doesn't take down its own session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    DropOldestBroadcast,
    Disconnect,
}

/// Default high-water mark on a connection's write queue before the
/// backpressure policy engages.
pub const DEFAULT_WRITE_QUEUE_HIGH_WATER: usize = 1024;

struct WriteQueue {
    frames: Mutex<VecDeque<ServerMessage>>,
    notify: Notify,
    high_water_mark: usize,
    policy: BackpressurePolicy,
}

/// A live session over the Unix socket. Multiple
/// producers — the command handler replying to its own request, bus
/// fan-out, async completion notifications — enqueue onto `queue`; a
/// single writer task owned by the listener drains it in order.
pub struct Connection {
    pub conn_id: ConnId,
    peer_identity: Mutex<Option<AgentId>>,
    closed: AtomicBool,
    queue: WriteQueue,
}

impl Connection {
    pub fn new(conn_id: ConnId, policy: BackpressurePolicy) -> Arc<Self> {
        Arc::new(Self {
            conn_id,
            peer_identity: Mutex::new(None),
            closed: AtomicBool::new(false),
            queue: WriteQueue {
                frames: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                high_water_mark: DEFAULT_WRITE_QUEUE_HIGH_WATER,
                policy,
            },
        })
    }

    pub fn peer_identity(&self) -> Option<AgentId> {
        *self.peer_identity.lock()
    }

    pub fn bind_agent(&self, agent_id: AgentId) {
        *self.peer_identity.lock() = Some(agent_id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
        self.queue.notify.notify_one();
    }

    /// Enqueue a frame for the writer task. Never blocks the publisher
    ///" — the same rule applies here to the
    /// per-connection write queue).
    pub fn enqueue(&self, msg: ServerMessage) {
        if self.is_closed() {
            return;
        }
        let mut frames = self.queue.frames.lock();
        if frames.len() >= self.queue.high_water_mark {
            match self.queue.policy {
                BackpressurePolicy::DropOldestBroadcast => {
                    frames.pop_front();
                    warn!(conn_id = %self.conn_id, "write queue high-water mark hit, dropped oldest frame");
                }
                BackpressurePolicy::Disconnect => {
                    drop(frames);
                    warn!(conn_id = %self.conn_id, "write queue high-water mark hit, disconnecting");
                    self.mark_closed();
                    return;
                }
            }
        }
        frames.push_back(msg);
        drop(frames);
        self.queue.notify.notify_one();
    }

    /// Wait for at least one frame to be available, then drain all
    /// currently queued frames in enqueue order. Returns an empty vec only
    /// when the connection has been closed with nothing left to flush.
    pub async fn drain_or_wait(&self) -> Vec<ServerMessage> {
        loop {
            {
                let mut frames = self.queue.frames.lock();
                if !frames.is_empty() {
                    return frames.drain(..).collect();
                }
                if self.is_closed() {
                    return Vec::new();
                }
            }
            self.queue.notify.notified().await;
        }
    }

    /// Drain whatever is queued right now without waiting (used by the
    /// bounded shutdown drain).
    pub fn drain_now(&self) -> Vec<ServerMessage> {
        self.queue.frames.lock().drain(..).collect()
    }
}

pub type ConnectionRef = Arc<Connection>;

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
