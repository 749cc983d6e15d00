use std::fmt;
use std::str::Split;

use arcstr::ArcStr;

use super::error::{TopicError, limits, validation};

/// A concrete, wildcard-free topic received with a publish.
///
/// Cloning is cheap: the underlying string is reference counted, so a topic
/// can be used as a cache key without copying the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(ArcStr);

impl Topic {
	/// Validates and wraps a concrete topic.
	pub fn new(topic: impl Into<ArcStr>) -> Result<Self, TopicError> {
		let topic = topic.into();
		if topic.is_empty() {
			return Err(TopicError::Empty);
		}
		if !validation::is_valid_length(&topic) {
			return Err(TopicError::TooLong {
				len: topic.len(),
				limit: limits::MAX_TOPIC_LENGTH,
			});
		}
		if let Some(c) = validation::find_illegal_topic_char(&topic) {
			return Err(TopicError::illegal_character(topic.as_str(), c));
		}
		Ok(Self(topic))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn as_arcstr(&self) -> &ArcStr {
		&self.0
	}

	/// Iterates over the topic levels in order. Empty levels are preserved.
	pub fn segments(&self) -> Split<'_, char> {
		self.0.split(limits::LEVEL_SEPARATOR)
	}

	pub fn level_count(&self) -> usize {
		self.segments().count()
	}
}

impl TryFrom<&str> for Topic {
	type Error = TopicError;

	fn try_from(topic: &str) -> Result<Self, Self::Error> {
		Topic::new(topic)
	}
}

impl TryFrom<String> for Topic {
	type Error = TopicError;

	fn try_from(topic: String) -> Result<Self, Self::Error> {
		Topic::new(topic)
	}
}

impl AsRef<str> for Topic {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}

impl fmt::Display for Topic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
