//! Topic module containing pattern matching and the subscription registry.

pub mod pattern;
pub mod registry;

pub use pattern::{matches, TopicPattern};
pub use registry::TopicRegistry;
