use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::subscriber::{Callback, SubscriberId};
use crate::core::topics::pattern::TopicPattern;

/// Subscribers registered under one exact pattern string.
struct PatternEntry {
    pattern: TopicPattern,
    subscribers: HashMap<SubscriberId, Callback>,
}

/// [`TopicRegistry`] maps topic patterns to their named subscriber callbacks.
///
/// A single mutex guards the whole map. It is held only for the map
/// operation itself; the dispatch loop takes a [`snapshot`](Self::snapshot)
/// and invokes callbacks after releasing it, so callbacks are free to
/// subscribe, unsubscribe or publish.
#[derive(Default)]
pub struct TopicRegistry {
    patterns: Mutex<HashMap<String, PatternEntry>>,
}

impl std::fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("patterns", &self.patterns())
            .finish()
    }
}

impl TopicRegistry {
    /// Creates a new empty [`TopicRegistry`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `subscriber_id` under `pattern`, replacing any
    /// callback the same id already held there.
    pub fn subscribe(&self, pattern: &str, subscriber_id: SubscriberId, callback: Callback) {
        let mut patterns = self.patterns.lock();
        let entry = patterns
            .entry(pattern.to_owned())
            .or_insert_with(|| {
                debug!(target: "topicbus::registry", pattern, "new pattern registered");
                PatternEntry {
                    pattern: TopicPattern::new(pattern),
                    subscribers: HashMap::new(),
                }
            });

        if entry.subscribers.insert(subscriber_id, callback).is_some() {
            debug!(target: "topicbus::registry", pattern, "subscriber callback replaced");
        }
    }

    /// Removes `subscriber_id` from `pattern`.
    ///
    /// Returns `false` when either was not registered. A pattern left without
    /// subscribers is dropped.
    pub fn unsubscribe(&self, pattern: &str, subscriber_id: &SubscriberId) -> bool {
        let mut patterns = self.patterns.lock();
        let Some(entry) = patterns.get_mut(pattern) else {
            return false;
        };

        let removed = entry.subscribers.remove(subscriber_id).is_some();
        if entry.subscribers.is_empty() {
            patterns.remove(pattern);
            debug!(target: "topicbus::registry", pattern, "pattern has no subscribers left; removed");
        }
        removed
    }

    /// Copies every pattern with its callbacks out from under the lock.
    pub fn snapshot(&self) -> Vec<(TopicPattern, Vec<Callback>)> {
        self.patterns
            .lock()
            .values()
            .map(|entry| {
                (
                    entry.pattern.clone(),
                    entry.subscribers.values().cloned().collect(),
                )
            })
            .collect()
    }

    /// Callbacks of every pattern matching `topic`, grouped by pattern.
    pub fn matching(&self, topic: &str) -> Vec<(TopicPattern, Vec<Callback>)> {
        let mut snapshot = self.snapshot();
        snapshot.retain(|(pattern, _)| pattern.matches(topic));
        snapshot
    }

    /// Lists all pattern strings currently registered.
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.lock().keys().cloned().collect()
    }

    /// Subscriber ids registered under `pattern`.
    pub fn subscribers(&self, pattern: &str) -> Vec<SubscriberId> {
        self.patterns
            .lock()
            .get(pattern)
            .map(|entry| entry.subscribers.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.lock().len()
    }

    pub fn subscription_count(&self) -> usize {
        self.patterns
            .lock()
            .values()
            .map(|entry| entry.subscribers.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.lock().is_empty()
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        self.patterns.lock().clear();
    }
}
