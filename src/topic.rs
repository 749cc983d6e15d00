//! Topic handling module
//!
//! This module provides the building blocks for MQTT topic routing:
//! validated topic filters (patterns with `+` and `#` wildcards), concrete
//! wildcard-free topics and the matcher deciding whether a topic satisfies
//! a filter.

// Submodules
pub mod error;
pub mod topic_filter;
pub mod topic_path;


// Re-export commonly used types for convenience
pub use error::{TopicError, TopicFilterError, limits, validation};
pub use topic_filter::{TopicFilter, TopicFilterItem, matches};
pub use topic_path::Topic;
