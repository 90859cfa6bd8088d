// SPDX-License-Identifier: MIT

//! Aggregates every subsystem the daemon wires together at startup into one
//! value, passed explicitly to the listener and every handler rather than
//! reached via globals.

use std::sync::Arc;

use tokio::sync::Notify;

use ksi_core::{SharedClock, SystemClock};

use crate::bus::MessageBus;
use crate::config::Config;
use crate::connections::ConnectionDirectory;
use crate::permissions::PermissionManager;
use crate::registry::AgentRegistry;
use crate::router::EventRouter;
use crate::sandbox::SandboxManager;
use crate::state::EntityStore;
use crate::supervisor::Supervisor;

pub struct DaemonContext {
    pub config: Config,
    pub router: Arc<EventRouter>,
    pub bus: Arc<MessageBus>,
    pub supervisor: Arc<Supervisor>,
    pub permissions: Arc<PermissionManager>,
    pub sandbox: Arc<SandboxManager>,
    pub registry: Arc<AgentRegistry>,
    pub state: Arc<EntityStore>,
    pub connections: Arc<ConnectionDirectory>,
    /// Signaled by the `system:shutdown` handler; `main` selects on this
    /// alongside the accept loop to begin a graceful drain.
    pub shutdown: Arc<Notify>,
}

impl DaemonContext {
    /// Build every subsystem in dependency order: clock first, then the
    /// stores that don't depend on each other, then the router that
    /// handlers will be registered against.
    pub fn build(config: Config) -> Arc<Self> {
        let clock = SharedClock::new(SystemClock);

        let router = Arc::new(EventRouter::new(clock.clone(), config.transformer_depth_cap));
        let bus = MessageBus::new(config.offline_queue_capacity, config.history_size, config.logs_dir().join("message_bus.jsonl"));
        let supervisor = Supervisor::new(config.max_inflight_subprocesses, config.kill_grace);
        let permissions = Arc::new(PermissionManager::load_profiles(&config.profiles_dir()));
        let sandbox = Arc::new(SandboxManager::new(config.sandbox_root(), clock.clone()));
        let registry = AgentRegistry::new(config.conversations_dir());
        let state = Arc::new(EntityStore::new(clock));
        let connections = ConnectionDirectory::new();
        let shutdown = Arc::new(Notify::new());

        Arc::new(Self {
            config,
            router,
            bus,
            supervisor,
            permissions,
            sandbox,
            registry,
            state,
            connections,
            shutdown,
        })
    }
}
