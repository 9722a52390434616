//! Process-wide broker instance.
//!
//! Prefer building a [`Broker`] in the application's composition root and
//! passing it around. This module exists for code that has no such handle:
//! [`get_instance`] returns the shared broker, creating it on first use or
//! after the previous one was stopped.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use crate::broker::Broker;
use crate::config::BrokerConfig;
use crate::core::error::BrokerError;

static INSTANCE: Lazy<Mutex<Option<Arc<Broker>>>> = Lazy::new(|| Mutex::new(None));

/// Returns the running process-wide broker, or builds one from `config`.
///
/// `config` is ignored when a running instance already exists.
pub fn get_instance(config: Option<BrokerConfig>) -> Result<Arc<Broker>, BrokerError> {
    let mut slot = INSTANCE.lock();
    if let Some(broker) = slot.as_ref().filter(|b| b.is_running()) {
        return Ok(Arc::clone(broker));
    }

    let broker = Arc::new(Broker::new(config.unwrap_or_default())?);
    debug!(target: "topicbus::global", broker = %broker.id(), "process-wide broker created");
    *slot = Some(Arc::clone(&broker));
    Ok(broker)
}

/// Stops the process-wide broker and forgets it.
///
/// Returns `false` if there was none.
pub fn stop_instance() -> bool {
    // Release the slot before stopping; stop may wait on a running callback.
    let broker = INSTANCE.lock().take();
    match broker {
        Some(broker) => {
            broker.stop();
            true
        }
        None => false,
    }
}
