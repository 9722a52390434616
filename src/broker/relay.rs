//! Boundary towards an external relay transport.
//!
//! No transport ships with this crate. When `network.enabled` is set, the
//! broker hands out a single outbox; while that outbox is held, every
//! accepted *local* message is copied into it for a transport to forward.
//! With no outbox attached, or after it is dropped, nothing is copied.
//! Messages that carry an `origin` came in through a relay already and are
//! never copied, which keeps two relaying brokers from bouncing a message
//! back and forth.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::message::Message;

#[derive(Debug)]
pub(crate) struct RelayChannel {
    tx: Mutex<Option<flume::Sender<Message>>>,
    // Held here until a transport takes the outbox.
    unclaimed: Mutex<Option<flume::Receiver<Message>>>,
}

impl RelayChannel {
    pub(crate) fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx: Mutex::new(Some(tx)),
            unclaimed: Mutex::new(Some(rx)),
        }
    }

    /// Queues `message` for outward relay if it is local and an outbox is
    /// attached.
    ///
    /// Returns `true` when the message was handed to the outbox.
    pub(crate) fn offer(&self, message: &Message) -> bool {
        if !message.is_local() {
            return false;
        }
        if self.unclaimed.lock().is_some() {
            debug!(target: "topicbus::relay", topic = %message.topic, "no relay outbox attached; not relayed");
            return false;
        }
        match self.tx.lock().as_ref() {
            Some(tx) => match tx.send(message.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(target: "topicbus::relay", topic = %message.topic, "relay outbox dropped; not relayed");
                    false
                }
            },
            None => false,
        }
    }

    /// Hands out the outbox. Only the first call gets one.
    pub(crate) fn take_outbox(&self) -> Option<RelayOutbox> {
        self.unclaimed.lock().take().map(|rx| RelayOutbox { rx })
    }

    /// Drops the sending side; outboxes see a disconnect once drained.
    pub(crate) fn close(&self) {
        self.tx.lock().take();
    }
}

/// Receiving end handed to a relay transport.
#[derive(Debug, Clone)]
pub struct RelayOutbox {
    rx: flume::Receiver<Message>,
}

impl RelayOutbox {
    pub fn try_recv(&self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Waits for the next message. `None` on timeout or once the broker
    /// stopped and the outbox is drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Message> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Takes everything currently waiting.
    pub fn drain(&self) -> Vec<Message> {
        self.rx.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_local_messages_are_offered() {
        let relay = RelayChannel::new();
        let outbox = relay.take_outbox().unwrap();

        assert!(relay.offer(&Message::new("a.b", json!(1))));
        assert!(!relay.offer(&Message::relayed("a.b", json!(2), "peer")));

        let drained = outbox.drain();
        assert_eq!(drained, vec![Message::new("a.b", json!(1))]);
        assert!(outbox.is_empty());
    }

    #[test]
    fn nothing_is_retained_without_an_outbox() {
        let relay = RelayChannel::new();
        for i in 0..1_000 {
            assert!(!relay.offer(&Message::new("a.b", json!(i))));
        }

        let outbox = relay.take_outbox().unwrap();
        assert!(outbox.is_empty());
        assert!(relay.take_outbox().is_none());

        drop(outbox);
        assert!(!relay.offer(&Message::new("a.b", json!(1))));
    }

    #[test]
    fn close_stops_offering() {
        let relay = RelayChannel::new();
        let outbox = relay.take_outbox().unwrap();
        relay.close();
        assert!(!relay.offer(&Message::new("a.b", json!(1))));
        assert!(outbox.try_recv().is_none());
        assert!(outbox.is_closed());
    }
}
