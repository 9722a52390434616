//! Subscriber identity and callback type used in per-pattern routing.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde_json::Value;

/// Callback invoked on the dispatch thread with a message's data.
///
/// Returning `Err` (or panicking) is reported and counted, but never stops
/// delivery to other subscribers.
pub type Callback = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Caller-supplied identifier of a subscriber.
///
/// Unique per pattern: subscribing the same id to the same pattern again
/// replaces the earlier callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub String);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriberId {
    fn from(s: &str) -> Self {
        SubscriberId(s.to_owned())
    }
}

impl From<String> for SubscriberId {
    fn from(s: String) -> Self {
        SubscriberId(s)
    }
}

impl From<&SubscriberId> for SubscriberId {
    fn from(id: &SubscriberId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for SubscriberId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for SubscriberId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Wraps an infallible closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(move |data: &Value| -> anyhow::Result<()> {
        f(data);
        Ok(())
    })
}
