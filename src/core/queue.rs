use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::message::Message;

/// Binary wake event for the single dispatch consumer.
///
/// Any number of `notify` calls before a wait collapse into one wake-up.
#[derive(Debug, Default)]
pub struct WakeSignal {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.cond.notify_one();
    }

    /// Blocks until notified or `timeout` elapses, then clears the signal.
    ///
    /// Returns `true` when woken by a notification. A signal raised before
    /// the call returns immediately.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock();
        while !*signaled {
            if self.cond.wait_until(&mut signaled, deadline).timed_out() {
                break;
            }
        }
        std::mem::replace(&mut *signaled, false)
    }
}

/// Unbounded FIFO shared by all publishers and the one dispatch consumer.
///
/// Publishers never block beyond the append itself.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    messages: Mutex<VecDeque<Message>>,
    wake: WakeSignal,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and signals the consumer.
    pub fn enqueue(&self, message: Message) {
        self.messages.lock().push_back(message);
        self.wake.notify();
    }

    /// Removes and returns everything currently queued, oldest first.
    pub fn drain_nowait(&self) -> Vec<Message> {
        let mut messages = self.messages.lock();
        messages.drain(..).collect()
    }

    /// Suspends the consumer until an enqueue/`wake` or the timeout.
    pub fn wait_for_wake(&self, timeout: Duration) -> bool {
        self.wake.wait(timeout)
    }

    /// Signals the consumer without enqueuing anything.
    pub fn wake(&self) {
        self.wake.notify();
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}
