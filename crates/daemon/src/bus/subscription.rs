// SPDX-License-Identifier: MIT

//! Subscription Registry: `(event-pattern -> set of
//! subscriber connections)`, with an exact-name fast path and a wildcard
//! list, unioned on publish.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::connection::ConnectionRef;
use crate::router::pattern::Pattern;

/// Default offline-queue capacity per agent.
pub const DEFAULT_OFFLINE_QUEUE_CAPACITY: usize = 1000;

/// `(subscriber_id, pattern, connection_ref, rate_limit?, created_at)`
///.
#[derive(Clone)]
pub struct Subscription {
    pub subscriber_id: String,
    pub pattern: Pattern,
    pub connection: ConnectionRef,
    pub rate_limit: Option<u32>,
    pub created_at: u64,
}

#[derive(Default)]
struct Subscriptions {
    /// Exact-name subscriptions, keyed by event name for O(1) lookup.
    exact: HashMap<String, Vec<Subscription>>,
    /// Subscriptions whose pattern contains a wildcard segment.
    wildcard: Vec<Subscription>,
}

/// Tracks every live `(subscriber, pattern)` tuple. A single writer lock
/// guards mutation; `matching_connections` takes a short read lock and
/// clones what it needs.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subs: RwLock<Subscriptions>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one subscription per pattern, deduplicating repeats of the same
    /// `(subscriber_id, pattern)` pair.
    pub fn subscribe(
        &self,
        subscriber_id: &str,
        patterns: &[String],
        connection: ConnectionRef,
        created_at: u64,
    ) {
        let mut subs = self.subs.write();
        for raw in patterns {
            let pattern = Pattern::new(raw.clone());
            if pattern.is_wildcard() {
                if subs.wildcard.iter().any(|s| s.subscriber_id == subscriber_id && s.pattern == pattern) {
                    continue;
                }
                subs.wildcard.push(Subscription {
                    subscriber_id: subscriber_id.to_string(),
                    pattern,
                    connection: connection.clone(),
                    rate_limit: None,
                    created_at,
                });
            } else {
                let entry = subs.exact.entry(raw.clone()).or_default();
                if entry.iter().any(|s| s.subscriber_id == subscriber_id) {
                    continue;
                }
                entry.push(Subscription {
                    subscriber_id: subscriber_id.to_string(),
                    pattern,
                    connection: connection.clone(),
                    rate_limit: None,
                    created_at,
                });
            }
        }
    }

    /// Remove specific patterns for a subscriber, or every pattern when
    /// `patterns` is `None` (disconnect/explicit unsubscribe-all).
    pub fn unsubscribe(&self, subscriber_id: &str, patterns: Option<&[String]>) {
        let mut subs = self.subs.write();
        match patterns {
            Some(patterns) => {
                for raw in patterns {
                    if let Some(bucket) = subs.exact.get_mut(raw) {
                        bucket.retain(|s| s.subscriber_id != subscriber_id);
                    }
                    subs.wildcard.retain(|s| !(s.subscriber_id == subscriber_id && s.pattern.as_str() == raw));
                }
            }
            None => {
                for bucket in subs.exact.values_mut() {
                    bucket.retain(|s| s.subscriber_id != subscriber_id);
                }
                subs.wildcard.retain(|s| s.subscriber_id != subscriber_id);
            }
        }
    }

    /// Every connection whose subscriptions match `name`, deduplicated by
    /// subscriber id so a subscriber with two overlapping patterns still
    /// receives exactly one delivery.
    pub fn matching_connections(&self, name: &str) -> Vec<(String, ConnectionRef)> {
        let subs = self.subs.read();
        let mut seen: HashMap<String, ConnectionRef> = HashMap::new();
        if let Some(bucket) = subs.exact.get(name) {
            for s in bucket {
                seen.entry(s.subscriber_id.clone()).or_insert_with(|| s.connection.clone());
            }
        }
        for s in subs.wildcard.iter().filter(|s| s.pattern.matches(name)) {
            seen.entry(s.subscriber_id.clone()).or_insert_with(|| s.connection.clone());
        }
        seen.into_iter().collect()
    }

    pub fn patterns_for(&self, subscriber_id: &str) -> Vec<String> {
        let subs = self.subs.read();
        let mut out: Vec<String> = subs
            .exact
            .values()
            .flatten()
            .chain(subs.wildcard.iter())
            .filter(|s| s.subscriber_id == subscriber_id)
            .map(|s| s.pattern.as_str().to_string())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn total_subscriptions(&self) -> usize {
        let subs = self.subs.read();
        subs.exact.values().map(Vec::len).sum::<usize>() + subs.wildcard.len()
    }

    pub fn distinct_subscribers(&self) -> usize {
        let subs = self.subs.read();
        let mut ids: Vec<&str> =
            subs.exact.values().flatten().chain(subs.wildcard.iter()).map(|s| s.subscriber_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
