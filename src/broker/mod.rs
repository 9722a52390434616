//! # Broker Module
//!
//! The [`Broker`] handle owns one dispatch worker together with its topic
//! registry and queue. Producers call [`Broker::publish`], consumers call
//! [`Broker::subscribe`]; delivery happens later on the worker thread, never
//! on the publisher's stack.
//!
//! - `global`: an optional process-wide instance
//! - `relay`: the outbox handed to an external relay transport

pub mod global;
pub mod relay;

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::BrokerConfig;
use crate::core::dispatch::{DispatchHandle, DispatchLoop, DispatchShared};
use crate::core::error::BrokerError;
use crate::core::message::Message;
use crate::core::subscriber::{Callback, SubscriberId};
use crate::metrics::BrokerStats;

use self::relay::RelayChannel;
pub use self::relay::RelayOutbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Initialized,
    Running,
    Stopped,
}

#[derive(Debug)]
pub struct Broker {
    shared: Arc<DispatchShared>,
    config: BrokerConfig,
    state: Mutex<BrokerState>,
    worker: Mutex<Option<DispatchHandle>>,
    relay: Option<RelayChannel>,
}

impl Broker {
    /// Builds a broker and starts its dispatch worker.
    pub fn new(config: BrokerConfig) -> Result<Self, BrokerError> {
        config.validate()?;

        let id = Uuid::new_v4();
        debug!(target: "topicbus::broker", broker = %id, ?config, "broker initializing");

        let shared = Arc::new(DispatchShared::new(id));
        let relay = config.network.enabled.then(RelayChannel::new);

        let broker = Self {
            shared: Arc::clone(&shared),
            state: Mutex::new(BrokerState::Initialized),
            worker: Mutex::new(None),
            relay,
            config,
        };

        let handle = DispatchLoop::new(shared, broker.config.dispatch.wake_timeout)
            .spawn(&broker.config.dispatch.thread_name)?;
        *broker.worker.lock() = Some(handle);
        *broker.state.lock() = BrokerState::Running;

        info!(
            target: "topicbus::broker",
            broker = %id,
            relay = broker.relay.is_some(),
            "broker initialized"
        );
        Ok(broker)
    }

    pub fn with_defaults() -> Result<Self, BrokerError> {
        Self::new(BrokerConfig::default())
    }

    pub fn id(&self) -> Uuid {
        self.shared.id()
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn state(&self) -> BrokerState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == BrokerState::Running
    }

    /// Publishes a message, logging instead of returning any failure.
    ///
    /// Invalid messages (empty topic, `null` data) are discarded.
    pub fn publish(&self, message: Message) {
        match self.try_publish(message) {
            Ok(()) => {}
            Err(err @ BrokerError::NotRunning) => {
                warn!(target: "topicbus::broker", broker = %self.id(), error = %err, "message discarded");
            }
            Err(err) => {
                error!(target: "topicbus::broker", broker = %self.id(), error = %err, "invalid message format; message discarded");
            }
        }
    }

    /// Like [`publish`](Self::publish) but hands the failure back.
    pub fn try_publish(&self, message: Message) -> Result<(), BrokerError> {
        if let Err(err) = message.validate() {
            self.shared.metrics.inc_rejected();
            debug!(target: "topicbus::broker", ?message, "rejected message");
            return Err(err);
        }

        if !self.shared.is_running() {
            self.shared.metrics.inc_rejected();
            return Err(BrokerError::NotRunning);
        }

        if let Some(relay) = &self.relay {
            if relay.offer(&message) {
                self.shared.metrics.inc_relayed();
            }
        }

        self.shared.metrics.inc_published();
        self.shared.queue.enqueue(message);
        Ok(())
    }

    /// Registers `callback` for topics matching `pattern`.
    ///
    /// Subscribing an id already present under the same pattern replaces its
    /// callback. The callback runs on the dispatch thread; an `Err` or a panic
    /// is logged and does not affect other subscribers.
    pub fn subscribe<F>(
        &self,
        pattern: &str,
        subscriber_id: impl Into<SubscriberId>,
        callback: F,
    ) -> Result<(), BrokerError>
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_callback(pattern, subscriber_id, Arc::new(callback))
    }

    /// [`subscribe`](Self::subscribe) for an already type-erased callback.
    pub fn subscribe_callback(
        &self,
        pattern: &str,
        subscriber_id: impl Into<SubscriberId>,
        callback: Callback,
    ) -> Result<(), BrokerError> {
        if pattern.is_empty() {
            return Err(BrokerError::InvalidPattern);
        }
        if !self.shared.is_running() {
            return Err(BrokerError::NotRunning);
        }

        let subscriber_id = subscriber_id.into();
        debug!(
            target: "topicbus::broker",
            broker = %self.id(),
            pattern,
            subscriber = %subscriber_id,
            "subscribed"
        );
        self.shared.registry.subscribe(pattern, subscriber_id, callback);
        Ok(())
    }

    /// Removes a subscription. Unknown pattern/id pairs are ignored.
    pub fn unsubscribe(&self, pattern: &str, subscriber_id: impl Into<SubscriberId>) -> bool {
        let subscriber_id = subscriber_id.into();
        let removed = self.shared.registry.unsubscribe(pattern, &subscriber_id);
        debug!(
            target: "topicbus::broker",
            broker = %self.id(),
            pattern,
            subscriber = %subscriber_id,
            removed,
            "unsubscribed"
        );
        removed
    }

    /// Outbox for a relay transport.
    ///
    /// `None` unless `network.enabled`, and on every call after the first.
    /// Local messages are copied only while the returned outbox is alive.
    pub fn relay_outbox(&self) -> Option<RelayOutbox> {
        self.relay.as_ref().and_then(RelayChannel::take_outbox)
    }

    pub fn stats(&self) -> BrokerStats {
        self.shared.metrics.snapshot()
    }

    /// Messages accepted but not yet picked up by the dispatch worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.registry.subscription_count()
    }

    pub fn patterns(&self) -> Vec<String> {
        self.shared.registry.patterns()
    }

    /// Whether the dispatch thread is still executing.
    pub fn is_worker_alive(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the dispatch worker and drops every subscription.
    ///
    /// Waits for an in-flight callback to return, bounded by
    /// `dispatch.shutdown_timeout`. Later calls are no-ops.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state == BrokerState::Stopped {
                debug!(target: "topicbus::broker", broker = %self.id(), "broker already stopped");
                return;
            }
            *state = BrokerState::Stopped;
        }

        let id = self.id();
        debug!(target: "topicbus::broker", broker = %id, "broker stopping");
        self.shared.request_stop();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let timeout = self.config.dispatch.shutdown_timeout;
            if handle.thread_id() == thread::current().id() {
                // Called from a callback: the worker exits once it returns.
                debug!(target: "topicbus::broker", broker = %id, "stop called on the dispatch thread; not joining");
            } else if let Err((err, handle)) = handle.join_timeout(timeout) {
                warn!(target: "topicbus::broker", broker = %id, error = %err, "continuing shutdown without join");
                *self.worker.lock() = Some(handle);
            }
        }

        self.shared.registry.clear();

        let dropped = self.shared.queue.drain_nowait().len();
        if dropped > 0 {
            self.shared.metrics.inc_dropped_on_stop(dropped as u64);
            info!(target: "topicbus::broker", broker = %id, dropped, "undelivered messages discarded on stop");
        }

        if let Some(relay) = &self.relay {
            relay.close();
        }

        info!(target: "topicbus::broker", broker = %id, "broker stopped");
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        if self.state() != BrokerState::Stopped {
            self.stop();
        }
    }
}
