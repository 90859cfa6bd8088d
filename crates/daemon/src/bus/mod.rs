// SPDX-License-Identifier: MIT

//! Message Bus: publish/broadcast/direct-message
//! semantics layered on the Subscription Registry, a bounded history ring
//! buffer, and a bounded shutdown drain.

pub mod offline;
pub mod subscription;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, warn};

use ksi_core::{AgentId, EventContext, Notification};

use crate::connection::ConnectionRef;
use offline::OfflineQueues;
use subscription::{SubscriptionRegistry, DEFAULT_OFFLINE_QUEUE_CAPACITY};

/// Well-known message-bus event types.
pub const DIRECT_MESSAGE: &str = "DIRECT_MESSAGE";
pub const BROADCAST: &str = "BROADCAST";
pub const TASK_ASSIGNMENT: &str = "TASK_ASSIGNMENT";

/// Default size of the in-memory history ring buffer.
pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// Resolves capability-tagged agents for unaddressed `TASK_ASSIGNMENT`
/// publications. Implemented by the Agent Registry; kept as a
/// trait here so the bus doesn't depend on the registry's concrete type.
pub trait CapabilityResolver: Send + Sync {
    fn resolve(&self, required_capabilities: &[String]) -> Option<AgentId>;
    fn connection_for(&self, agent_id: &AgentId) -> Option<ConnectionRef>;
}

/// Outcome of one `publish` call, returned to the caller for the command
/// response (not broadcast back out).
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub delivered_direct: bool,
    pub queued_offline: bool,
    pub fanout_count: usize,
    pub resolved_to: Option<AgentId>,
}

/// The Message Bus. Owns the subscription registry, offline queues,
/// and history; publish never blocks on a slow or dead subscriber.
pub struct MessageBus {
    pub subscriptions: SubscriptionRegistry,
    offline: OfflineQueues,
    history: Mutex<VecDeque<Notification>>,
    history_size: usize,
    history_tx: mpsc::Sender<Notification>,
}

impl MessageBus {
    /// Builds the bus and spawns its history-writer task, which appends
    /// every published envelope to `logs_path` asynchronously; logging
    /// failures never propagate back to `publish`.
    pub fn new(offline_capacity: usize, history_size: usize, logs_path: PathBuf) -> Arc<Self> {
        let (history_tx, history_rx) = mpsc::channel(256);
        spawn_history_writer(logs_path, history_rx);
        Arc::new(Self {
            subscriptions: SubscriptionRegistry::new(),
            offline: OfflineQueues::new(offline_capacity),
            history: Mutex::new(VecDeque::with_capacity(history_size)),
            history_size,
            history_tx,
        })
    }

    pub fn for_tests(logs_path: PathBuf) -> Arc<Self> {
        Self::new(DEFAULT_OFFLINE_QUEUE_CAPACITY, DEFAULT_HISTORY_SIZE, logs_path)
    }

    /// Publish one event. `from` is the publishing subscriber id (an
    /// agent_id or connection id string); `resolver` supplies
    /// capability-based `TASK_ASSIGNMENT` resolution and live-connection
    /// lookups so the bus doesn't depend on the Agent Registry directly.
    pub fn publish(
        &self,
        event_name: &str,
        from: &str,
        data: serde_json::Value,
        ctx: &EventContext,
        resolver: &dyn CapabilityResolver,
    ) -> PublishOutcome {
        let notification = Notification { event: event_name.to_string(), data: data.clone(), context: ctx.clone() };
        self.record_history(notification.clone());

        match event_name {
            DIRECT_MESSAGE => self.publish_direct(from, &data, &notification, resolver, None),
            BROADCAST => {
                let fanout = self.fanout_except(event_name, from, &notification);
                PublishOutcome { delivered_direct: false, queued_offline: false, fanout_count: fanout, resolved_to: None }
            }
            TASK_ASSIGNMENT => {
                if data.get("to").and_then(|v| v.as_str()).is_some() {
                    self.publish_direct(from, &data, &notification, resolver, None)
                } else {
                    let required: Vec<String> = data
                        .get("required_capabilities")
                        .and_then(|v| v.as_array())
                        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                        .unwrap_or_default();
                    let resolved = resolver.resolve(&required);
                    self.publish_direct(from, &data, &notification, resolver, resolved)
                }
            }
            _ => {
                let fanout = self.fanout_all(event_name, &notification);
                PublishOutcome { delivered_direct: false, queued_offline: false, fanout_count: fanout, resolved_to: None }
            }
        }
    }

    fn publish_direct(
        &self,
        from: &str,
        data: &serde_json::Value,
        notification: &Notification,
        resolver: &dyn CapabilityResolver,
        resolved_to: Option<AgentId>,
    ) -> PublishOutcome {
        let to = resolved_to.or_else(|| data.get("to").and_then(|v| v.as_str()).map(AgentId::from_string));

        let (delivered_direct, queued_offline) = match to {
            Some(agent_id) => match resolver.connection_for(&agent_id) {
                Some(conn) if !conn.is_closed() => {
                    conn.enqueue(ksi_wire::ServerMessage::Notification(notification.clone()));
                    (true, false)
                }
                _ => {
                    self.offline.enqueue(agent_id, notification.clone());
                    (false, true)
                }
            },
            None => (false, false),
        };

        // Observers/monitors subscribed to the event type see it regardless
        // of whether the direct delivery succeeded.
        let fanout = self.fanout_except(&notification.event, from, notification);

        PublishOutcome { delivered_direct, queued_offline, fanout_count: fanout, resolved_to: to }
    }

    fn fanout_except(&self, event_name: &str, from: &str, notification: &Notification) -> usize {
        let mut count = 0;
        for (subscriber_id, conn) in self.subscriptions.matching_connections(event_name) {
            if subscriber_id == from {
                continue;
            }
            conn.enqueue(ksi_wire::ServerMessage::Notification(notification.clone()));
            count += 1;
        }
        count
    }

    fn fanout_all(&self, event_name: &str, notification: &Notification) -> usize {
        let mut count = 0;
        for (_subscriber_id, conn) in self.subscriptions.matching_connections(event_name) {
            conn.enqueue(ksi_wire::ServerMessage::Notification(notification.clone()));
            count += 1;
        }
        count
    }

    /// Deliver every queued offline message for `agent_id` to its
    /// newly (re)connected connection, in order, before anything else is
    /// sent on it.
    pub fn flush_offline(&self, agent_id: &AgentId, conn: &ConnectionRef) {
        for notification in self.offline.drain(agent_id) {
            conn.enqueue(ksi_wire::ServerMessage::Notification(notification));
        }
    }

    pub fn offline_dropped_count(&self, agent_id: &AgentId) -> u64 {
        self.offline.dropped_count(agent_id)
    }

    fn record_history(&self, notification: Notification) {
        {
            let mut history = self.history.lock();
            if history.len() >= self.history_size {
                history.pop_front();
            }
            history.push_back(notification.clone());
        }
        if self.history_tx.try_send(notification).is_err() {
            warn!("message bus history writer backlogged, dropping one log entry");
        }
    }

    pub fn history_snapshot(&self, limit: usize) -> Vec<Notification> {
        let history = self.history.lock();
        history.iter().rev().take(limit).cloned().collect()
    }

    /// `message_bus:stats`.
    pub fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "subscriptions": self.subscriptions.total_subscriptions(),
            "subscribers": self.subscriptions.distinct_subscribers(),
            "history_size": self.history.lock().len(),
            "offline_queued": self.offline.total_queued(),
        })
    }

    /// Bounded shutdown drain: cancel pending deliveries,
    /// clear offline queues and history. Completes promptly rather than
    /// waiting the full `timeout` — the bound is a ceiling, not a target.
    pub async fn shutdown_drain(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, async {
            self.offline.clear_all();
            self.history.lock().clear();
        })
        .await;
    }
}

#[derive(Serialize)]
struct HistoryRecord<'a> {
    event: &'a str,
    data: &'a serde_json::Value,
    context: &'a EventContext,
}

fn spawn_history_writer(logs_path: PathBuf, mut rx: mpsc::Receiver<Notification>) {
    tokio::spawn(async move {
        if let Some(parent) = logs_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!(error = %e, "failed to create message bus log directory");
            }
        }
        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(&logs_path).await;
        let mut file = match file {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %logs_path.display(), "failed to open message bus log");
                return;
            }
        };
        while let Some(notification) = rx.recv().await {
            let record = HistoryRecord { event: &notification.event, data: &notification.data, context: &notification.context };
            match serde_json::to_vec(&record) {
                Ok(mut line) => {
                    line.push(b'\n');
                    if let Err(e) = file.write_all(&line).await {
                        warn!(error = %e, "message bus history append failed");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize history record"),
            }
        }
    });
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
