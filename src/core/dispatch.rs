//! The dispatch worker.
//!
//! A single named thread per broker drains the [`DispatchQueue`], resolves
//! matching subscribers through the [`TopicRegistry`] and runs their
//! callbacks one after another. Because nothing else runs callbacks, a
//! subscriber sees one publisher's messages in publish order.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::error::BrokerError;
use crate::core::message::Message;
use crate::core::queue::DispatchQueue;
use crate::core::subscriber::Callback;
use crate::core::topics::{TopicPattern, TopicRegistry};
use crate::metrics::BrokerMetrics;

/// State shared between the broker handle and its dispatch worker.
#[derive(Debug)]
pub struct DispatchShared {
    id: Uuid,
    running: AtomicBool,
    pub registry: TopicRegistry,
    pub queue: DispatchQueue,
    pub metrics: BrokerMetrics,
}

impl DispatchShared {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            running: AtomicBool::new(true),
            registry: TopicRegistry::new(),
            queue: DispatchQueue::new(),
            metrics: BrokerMetrics::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag and wakes the worker.
    ///
    /// Returns `false` if the flag was already cleared.
    pub fn request_stop(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        self.queue.wake();
        was_running
    }
}

#[derive(Debug)]
pub struct DispatchLoop {
    shared: Arc<DispatchShared>,
    wake_timeout: Duration,
}

impl DispatchLoop {
    pub fn new(shared: Arc<DispatchShared>, wake_timeout: Duration) -> Self {
        Self {
            shared,
            wake_timeout,
        }
    }

    /// Starts the loop on a dedicated thread named `thread_name`.
    pub fn spawn(self, thread_name: &str) -> Result<DispatchHandle, BrokerError> {
        let (done_tx, done_rx) = flume::bounded::<()>(1);
        let thread = thread::Builder::new()
            .name(thread_name.to_owned())
            .spawn(move || {
                // Dropped on exit, which is what `join_timeout` waits for.
                let _done = done_tx;
                self.run();
            })?;

        Ok(DispatchHandle {
            thread,
            done: done_rx,
        })
    }

    /// Runs until the running flag is cleared. Checked once per iteration.
    pub fn run(self) {
        let id = self.shared.id();
        info!(target: "topicbus::dispatch", broker = %id, "dispatch loop started");

        while self.shared.is_running() {
            let started = Instant::now();
            let processed = self.drain();
            if processed > 0 {
                debug!(
                    target: "topicbus::dispatch",
                    broker = %id,
                    processed,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "dispatch pass finished"
                );
            }

            if !self.shared.is_running() {
                break;
            }

            let idle_since = Instant::now();
            let signaled = self.shared.queue.wait_for_wake(self.wake_timeout);
            self.shared.metrics.inc_dispatch_passes();
            debug!(
                target: "topicbus::dispatch",
                broker = %id,
                signaled,
                slept_ms = idle_since.elapsed().as_millis() as u64,
                "dispatch loop woke up"
            );
        }

        info!(target: "topicbus::dispatch", broker = %id, "dispatch loop stopped");
    }

    /// Dispatches until the queue is empty. Messages already taken off the
    /// queue are always delivered, even if a stop arrives meanwhile.
    fn drain(&self) -> usize {
        let mut processed = 0;

        loop {
            let batch = self.shared.queue.drain_nowait();
            if batch.is_empty() {
                return processed;
            }

            for message in &batch {
                self.dispatch(message);
                processed += 1;
            }
        }
    }

    fn dispatch(&self, message: &Message) {
        let topic = message.topic.as_str();
        let matched = self.shared.registry.matching(topic);
        if matched.is_empty() {
            debug!(target: "topicbus::dispatch", topic, "no subscribers for topic");
            return;
        }

        for (pattern, callbacks) in matched {
            for callback in &callbacks {
                self.invoke(&pattern, callback, message);
            }
        }
    }

    fn invoke(&self, pattern: &TopicPattern, callback: &Callback, message: &Message) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&message.data)));
        self.shared.metrics.inc_dispatched(1);

        let reason = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{e:#}"),
            Err(payload) => format!("panicked: {}", panic_message(&*payload)),
        };

        self.shared.metrics.inc_callback_failures();
        let err = BrokerError::Callback {
            topic: message.topic.clone(),
            pattern: pattern.to_string(),
            reason,
        };
        error!(
            target: "topicbus::dispatch",
            broker = %self.shared.id(),
            error = %err,
            "subscriber callback failed"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Owner side of a running dispatch thread.
#[derive(Debug)]
pub struct DispatchHandle {
    thread: JoinHandle<()>,
    done: flume::Receiver<()>,
}

impl DispatchHandle {
    pub fn thread_id(&self) -> ThreadId {
        self.thread.thread().id()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    fn wait_finished(&self, timeout: Duration) -> bool {
        !matches!(
            self.done.recv_timeout(timeout),
            Err(flume::RecvTimeoutError::Timeout)
        )
    }

    /// Waits up to `timeout` for the worker to exit, then joins it.
    ///
    /// On timeout the handle is given back with the error so the caller can
    /// keep tracking the thread; it still exits on its own once the callback
    /// it is running returns.
    pub fn join_timeout(self, timeout: Duration) -> Result<(), (BrokerError, Self)> {
        if !self.wait_finished(timeout) {
            return Err((BrokerError::ShutdownTimeout(timeout), self));
        }
        if self.thread.join().is_err() {
            warn!(target: "topicbus::dispatch", "dispatch worker exited by panic");
        }
        Ok(())
    }
}
