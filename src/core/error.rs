use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the broker.
///
/// None of these are fatal: `Broker::publish` only logs them, and callback
/// failures never leave the dispatch thread.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("topic pattern must not be empty")]
    InvalidPattern,

    #[error("broker is not running")]
    NotRunning,

    #[error("callback for pattern '{pattern}' failed on topic '{topic}': {reason}")]
    Callback {
        topic: String,
        pattern: String,
        reason: String,
    },

    #[error("dispatch worker did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("failed to spawn dispatch worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}
