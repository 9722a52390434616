use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::BrokerError;

/// A published message.
///
/// `origin` is `None` for messages produced inside this process. A relay that
/// injects messages received from elsewhere sets it, which keeps those
/// messages from being relayed outward a second time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Message {
    /// Creates a locally-originated message.
    pub fn new(topic: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            topic: topic.into(),
            data: data.into(),
            origin: None,
        }
    }

    /// Creates a message that arrived from an external relay.
    pub fn relayed(
        topic: impl Into<String>,
        data: impl Into<Value>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            data: data.into(),
            origin: Some(origin.into()),
        }
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        self.origin.is_none()
    }

    /// Checks the publish-time invariants: non-empty topic, data present.
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.topic.is_empty() {
            return Err(BrokerError::InvalidMessage("topic is empty".into()));
        }
        if self.data.is_null() {
            return Err(BrokerError::InvalidMessage(format!(
                "message on topic '{}' carries no data",
                self.topic
            )));
        }
        if matches!(self.origin.as_deref(), Some(o) if o.is_empty()) {
            return Err(BrokerError::InvalidMessage(format!(
                "relayed message on topic '{}' has an empty origin",
                self.topic
            )));
        }
        Ok(())
    }
}
