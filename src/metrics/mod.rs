use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

// Coarse per-broker counters. Relaxed ordering is enough for reporting.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
    published: AtomicU64,
    rejected: AtomicU64,
    dispatched: AtomicU64,
    callback_failures: AtomicU64,
    dispatch_passes: AtomicU64,
    relayed: AtomicU64,
    dropped_on_stop: AtomicU64,
}

impl BrokerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_dispatched(&self, n: u64) {
        self.dispatched.fetch_add(n, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_callback_failures(&self) {
        self.callback_failures.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_dispatch_passes(&self) {
        self.dispatch_passes.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_relayed(&self) {
        self.relayed.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_dropped_on_stop(&self, n: u64) {
        self.dropped_on_stop.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BrokerStats {
        BrokerStats {
            published: self.published.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            dispatch_passes: self.dispatch_passes.load(Ordering::Relaxed),
            relayed: self.relayed.load(Ordering::Relaxed),
            dropped_on_stop: self.dropped_on_stop.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a broker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Messages accepted by `publish`.
    pub published: u64,
    /// Messages discarded by validation or because the broker was stopped.
    pub rejected: u64,
    /// Callback invocations, successful or not.
    pub dispatched: u64,
    pub callback_failures: u64,
    /// Wake-ups of the dispatch loop, including timeouts.
    pub dispatch_passes: u64,
    /// Local messages handed to the relay outbox.
    pub relayed: u64,
    /// Messages still queued when the broker stopped.
    pub dropped_on_stop: u64,
}

impl BrokerStats {
    /// Prometheus-style text, without HELP/TYPE lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in [
            ("topicbus_published", self.published),
            ("topicbus_rejected", self.rejected),
            ("topicbus_dispatched", self.dispatched),
            ("topicbus_callback_failures", self.callback_failures),
            ("topicbus_dispatch_passes", self.dispatch_passes),
            ("topicbus_relayed", self.relayed),
            ("topicbus_dropped_on_stop", self.dropped_on_stop),
        ] {
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}
