//! topicbus – an in-process publish/subscribe broker.
//!
//! This crate exports
//!  * `core`    – message, topic pattern, registry, queue and dispatch loop
//!  * `broker`  – the `Broker` handle and its lifecycle
//!  * `config`  – TOML/env-driven runtime configuration
//!  * `logging` – tracing subscriber setup
//!  * `metrics` – per-broker counters
//!
//! Applications normally build one `Broker` in their composition root and
//! hand `Arc<Broker>` to producers and consumers. `broker::global` offers a
//! process-wide instance for code that cannot thread a handle through.

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod broker;
pub mod config;
pub mod core;
pub mod logging;
pub mod metrics;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use broker::global::{get_instance, stop_instance};
pub use broker::{Broker, BrokerState, RelayOutbox};
pub use config::{BrokerConfig, DispatchConfig, NetworkConfig};
pub use crate::core::error::{BrokerError, ConfigError};
pub use crate::core::message::Message;
pub use crate::core::subscriber::{callback, Callback, SubscriberId};
pub use crate::core::topics::TopicPattern;
pub use metrics::BrokerStats;
