// SPDX-License-Identifier: MIT

//! Event Router: dispatch events to handlers by name or
//! pattern, propagate context, run transformers, and collect multi-handler
//! responses.
//!
//! Handlers are discovered from an explicit, code-built registry rather
//! than the source's decorator-based self-registration: `register` is called once per handler during daemon startup.

pub mod pattern;
pub mod transform;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use ksi_core::{EventContext, KsiError, Originator, SharedClock};

use pattern::Pattern;
use transform::TransformerRule;

/// What a handler returns for one invocation.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutcome {
    pub response: Option<Value>,
    pub terminal: bool,
}

impl HandlerOutcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn value(v: Value) -> Self {
        Self { response: Some(v), terminal: false }
    }

    pub fn terminal(v: Value) -> Self {
        Self { response: Some(v), terminal: true }
    }
}

/// A registered event handler. Handlers never see system-injected context
/// fields mixed into `data` — those travel only in `ctx`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, data: Value, ctx: &EventContext) -> Result<HandlerOutcome, KsiError>;
}

/// Adapts a plain async closure into a [`Handler`], for small handlers that
/// don't need their own type.
pub struct FnHandler<F>(F);

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Value, EventContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HandlerOutcome, KsiError>> + Send,
{
    async fn handle(&self, data: Value, ctx: &EventContext) -> Result<HandlerOutcome, KsiError> {
        (self.0)(data, ctx.clone()).await
    }
}

struct Registration {
    pattern: Pattern,
    handler: Arc<dyn Handler>,
    priority: i32,
    seq: u64,
}

/// One handler's outcome from a dispatch, paired with the pattern that
/// matched it (for diagnostics).
pub struct DispatchEntry {
    pub result: Result<HandlerOutcome, KsiError>,
}

/// The full outcome of one `emit`/`emit_first` call.
pub struct EmitResult {
    pub ctx: EventContext,
    pub entries: Vec<DispatchEntry>,
}

impl EmitResult {
    /// The responses of every handler that returned one, in dispatch order.
    pub fn responses(&self) -> Vec<&Value> {
        self.entries.iter().filter_map(|e| e.result.as_ref().ok()?.response.as_ref()).collect()
    }

    /// First non-empty response, in dispatch order.
    pub fn first_response(&self) -> Option<&Value> {
        self.entries.iter().find_map(|e| e.result.as_ref().ok()?.response.as_ref())
    }

    /// First handler error, if any (surfaced to the client by the listener
    /// when no handler produced a success response).
    pub fn first_error(&self) -> Option<&KsiError> {
        self.entries.iter().find_map(|e| e.result.as_ref().err())
    }

    pub fn no_handlers(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The Event Router. Holds the handler registry and
/// transformer rules behind short-held locks.
pub struct EventRouter {
    handlers: RwLock<Vec<Registration>>,
    transformers: RwLock<Vec<TransformerRule>>,
    clock: SharedClock,
    depth_cap: u32,
    seq: AtomicU64,
}

impl EventRouter {
    pub fn new(clock: SharedClock, depth_cap: u32) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            transformers: RwLock::new(Vec::new()),
            clock,
            depth_cap,
            seq: AtomicU64::new(0),
        }
    }

    /// `register(pattern, handler, priority?)`. Higher priority
    /// dispatches first; ties broken by registration order.
    pub fn register(&self, pattern: &str, handler: Arc<dyn Handler>, priority: i32) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().push(Registration { pattern: Pattern::new(pattern), handler, priority, seq });
    }

    pub fn register_transformer(&self, rule: TransformerRule) {
        self.transformers.write().push(rule);
    }

    /// Dispatch a root event entering from a client connection.
    pub async fn emit_root(&self, name: &str, data: Value, originator: Originator) -> EmitResult {
        let ctx = EventContext::root(originator, &self.clock);
        self.dispatch(name, data, ctx).await
    }

    /// Dispatch an event emitted from inside a handler currently processing
    /// `parent`. The new context's `parent_correlation_id` points at
    /// `parent.correlation_id`.
    pub async fn emit_child(&self, name: &str, data: Value, parent: &EventContext) -> EmitResult {
        let ctx = parent.child(&self.clock);
        self.dispatch(name, data, ctx).await
    }

    /// `emit_first`: dispatch as usual; return the first non-empty response.
    /// All matching handlers still run unless one marks its outcome
    /// terminal.
    pub async fn emit_first_root(
        &self,
        name: &str,
        data: Value,
        originator: Originator,
    ) -> (Option<Value>, EmitResult) {
        let result = self.emit_root(name, data, originator).await;
        (result.first_response().cloned(), result)
    }

    fn matching_handlers(&self, name: &str) -> Vec<(Arc<dyn Handler>, i32, u64)> {
        let handlers = self.handlers.read();
        let mut matched: Vec<_> = handlers
            .iter()
            .filter(|r| r.pattern.matches(name))
            .map(|r| (Arc::clone(&r.handler), r.priority, r.seq))
            .collect();
        // priority desc, then registration order asc.
        matched.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        matched
    }

    fn dispatch<'a>(
        &'a self,
        name: &'a str,
        data: Value,
        ctx: EventContext,
    ) -> Pin<Box<dyn Future<Output = EmitResult> + Send + 'a>> {
        Box::pin(async move {
            let matched = self.matching_handlers(name);
            let mut entries = Vec::with_capacity(matched.len());
            for (handler, _priority, _seq) in matched {
                let result = handler.handle(data.clone(), &ctx).await;
                let terminal = matches!(&result, Ok(o) if o.terminal);
                entries.push(DispatchEntry { result });
                if terminal {
                    break;
                }
            }

            entries.extend(self.run_transformers(name, &data, &ctx).await);

            EmitResult { ctx, entries }
        })
    }

    /// Apply every transformer whose `source_pattern` matches `name`,
    /// deriving and emitting the mapped target event. Transformers never
    /// consume the source: `dispatch` for `name` already ran
    /// above regardless of what happens here. Derived-event handler
    /// responses (and a `TRANSFORMER_LOOP` entry if the depth cap is hit)
    /// bubble up into the caller's own entries so a loop surfaces all the
    /// way back to the client that triggered the chain.
    async fn run_transformers(&self, name: &str, data: &Value, ctx: &EventContext) -> Vec<DispatchEntry> {
        let rules: Vec<TransformerRule> = {
            let transformers = self.transformers.read();
            transformers.iter().filter(|r| r.applies(name, data)).cloned().collect()
        };
        let mut bubbled = Vec::new();
        for rule in rules {
            if ctx.transform_depth + 1 > self.depth_cap {
                warn!(
                    source = name,
                    target = %rule.target_event,
                    depth_cap = self.depth_cap,
                    "transformer depth exceeded, dropping derived event"
                );
                bubbled.push(DispatchEntry {
                    result: Err(KsiError::new(
                        ksi_core::ErrorCode::TransformerLoop,
                        format!("transformer depth cap ({}) exceeded deriving {} from {}", self.depth_cap, rule.target_event, name),
                    )),
                });
                continue;
            }
            let derived_ctx = ctx.derived(&self.clock);
            let derived_data = rule.mapping.resolve(data);
            debug!(source = name, target = %rule.target_event, "transformer fired");
            let derived = self.dispatch(&rule.target_event, derived_data, derived_ctx).await;
            bubbled.extend(derived.entries);
        }
        bubbled
    }
}

/// Strip known system-context keys from a handler-bound `data` object, for
/// legacy callers that flatten context fields into `data` rather than
/// reading the `ctx` accessor.
pub fn strip_system_fields(mut data: Value) -> Value {
    const SYSTEM_KEYS: &[&str] = &[
        "originator_id",
        "agent_id",
        "session_id",
        "correlation_id",
        "parent_correlation_id",
        "event_id",
        "timestamp",
        "source_agent",
    ];
    if let Some(obj) = data.as_object_mut() {
        for key in SYSTEM_KEYS {
            obj.remove(*key);
        }
    }
    data
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
