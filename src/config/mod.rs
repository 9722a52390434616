//! Runtime configuration.
//!
//! Values come from an optional TOML file (path argument or
//! `TOPICBUS_CONFIG`), with `TOPICBUS_*` environment variables taking
//! precedence. Every field has a default, so an empty file is valid.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::ConfigError;

pub const DEFAULT_WAKE_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_THREAD_NAME: &str = "topicbus-dispatch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound on how long the idle loop sleeps without a signal.
    pub wake_timeout: Duration,
    /// How long `stop` waits for the worker before giving up on the join.
    pub shutdown_timeout: Duration,
    pub thread_name: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            wake_timeout: Duration::from_millis(DEFAULT_WAKE_TIMEOUT_MS),
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

/// Settings reserved for an external relay transport. Only `enabled` has an
/// effect here: it turns on the relay outbox.
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub secret: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 8080,
            secret: String::new(),
        }
    }
}

impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &if self.secret.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerConfig {
    pub dispatch: DispatchConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    dispatch: FileDispatch,
    #[serde(default)]
    network: FileNetwork,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
struct FileDispatch {
    wake_timeout_ms: Option<u64>,
    shutdown_timeout_ms: Option<u64>,
    thread_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
struct FileNetwork {
    enabled: Option<bool>,
    host: Option<String>,
    port: Option<u16>,
    secret: Option<String>,
}

impl BrokerConfig {
    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(raw)?;
        let cfg = Self::from_file(file);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from an optional file path and environment variables.
    ///
    /// Precedence: file values provide defaults, environment variables override.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let env_path = env::var("TOPICBUS_CONFIG").ok();
        let effective_path = path.map(|s| s.to_string()).or(env_path);

        let file = match effective_path {
            Some(p) => Self::load_file(p)?,
            None => FileConfig::default(),
        };

        let mut cfg = Self::from_file(file);
        cfg.apply_env(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn load_file<P: AsRef<Path>>(path: P) -> Result<FileConfig, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    fn from_file(file: FileConfig) -> Self {
        let defaults = Self::default();
        let dispatch = DispatchConfig {
            wake_timeout: file
                .dispatch
                .wake_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.dispatch.wake_timeout),
            shutdown_timeout: file
                .dispatch
                .shutdown_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.dispatch.shutdown_timeout),
            thread_name: file
                .dispatch
                .thread_name
                .unwrap_or(defaults.dispatch.thread_name),
        };
        let network = NetworkConfig {
            enabled: file.network.enabled.unwrap_or(defaults.network.enabled),
            host: file.network.host.unwrap_or(defaults.network.host),
            port: file.network.port.unwrap_or(defaults.network.port),
            secret: file.network.secret.unwrap_or(defaults.network.secret),
        };
        Self { dispatch, network }
    }

    // Takes a lookup function so tests need not touch the process environment.
    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TOPICBUS_WAKE_TIMEOUT_MS") {
            self.dispatch.wake_timeout =
                Duration::from_millis(parse_u64("TOPICBUS_WAKE_TIMEOUT_MS", &v)?);
        }

        if let Some(v) = lookup("TOPICBUS_SHUTDOWN_TIMEOUT_MS") {
            self.dispatch.shutdown_timeout =
                Duration::from_millis(parse_u64("TOPICBUS_SHUTDOWN_TIMEOUT_MS", &v)?);
        }

        if let Some(v) = lookup("TOPICBUS_NETWORK_ENABLED") {
            self.network.enabled =
                matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        if let Some(v) = lookup("TOPICBUS_NETWORK_HOST") {
            self.network.host = v;
        }

        if let Some(v) = lookup("TOPICBUS_NETWORK_PORT") {
            self.network.port = v
                .parse()
                .map_err(|e| ConfigError::Parse(format!("TOPICBUS_NETWORK_PORT: {e}")))?;
        }

        if let Some(v) = lookup("TOPICBUS_NETWORK_SECRET") {
            self.network.secret = v;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.wake_timeout.is_zero() {
            return Err(ConfigError::Invalid("dispatch.wake_timeout_ms must be > 0".into()));
        }
        if self.dispatch.shutdown_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "dispatch.shutdown_timeout_ms must be > 0".into(),
            ));
        }
        if self.dispatch.thread_name.is_empty() {
            return Err(ConfigError::Invalid("dispatch.thread_name must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::Parse(format!("{key}: {e}")))
}
