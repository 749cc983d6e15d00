//! Error types and validation helpers shared by topics and topic filters.

use thiserror::Error;

/// Protocol limits and reserved characters for topic strings.
pub mod limits {
	/// Maximum length of a topic or topic filter in bytes
	pub const MAX_TOPIC_LENGTH: usize = 65_535;
	/// Separator between topic levels
	pub const LEVEL_SEPARATOR: char = '/';
	/// Wildcard matching exactly one topic level
	pub const SINGLE_LEVEL_WILDCARD: char = '+';
	/// Wildcard matching any number of trailing levels
	pub const MULTI_LEVEL_WILDCARD: char = '#';
}

/// Validation helpers used by [`Topic`](super::Topic) and
/// [`TopicFilter`](super::TopicFilter).
pub mod validation {
	use super::limits::{
		MAX_TOPIC_LENGTH, MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD,
	};

	/// Returns true if the string is within the protocol length limit
	pub fn is_valid_length(value: &str) -> bool {
		value.len() <= MAX_TOPIC_LENGTH
	}

	/// Returns the first character that is not allowed in a concrete topic
	pub fn find_illegal_topic_char(value: &str) -> Option<char> {
		value.chars().find(|c| {
			matches!(*c, '\0' | SINGLE_LEVEL_WILDCARD | MULTI_LEVEL_WILDCARD)
		})
	}
}

/// Errors raised when constructing a concrete [`Topic`](super::Topic)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
	/// Topic string is empty
	#[error("Topic cannot be empty")]
	Empty,

	/// Topic string exceeds the protocol limit
	#[error("Topic is {len} bytes long, the limit is {limit}")]
	TooLong { len: usize, limit: usize },

	/// Topic contains a wildcard or a null character
	#[error("Topic '{topic}' contains illegal character {character:?}")]
	IllegalCharacter { topic: String, character: char },
}

impl TopicError {
	/// Creates a new IllegalCharacter error
	pub fn illegal_character(topic: impl Into<String>, character: char) -> Self {
		Self::IllegalCharacter {
			topic: topic.into(),
			character,
		}
	}

	/// Returns the error type for categorization
	pub fn error_type(&self) -> &'static str {
		match self {
			| TopicError::Empty => "empty_topic",
			| TopicError::TooLong { .. } => "topic_too_long",
			| TopicError::IllegalCharacter { .. } => "illegal_character",
		}
	}
}

/// Errors raised when parsing a topic filter at registration time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicFilterError {
	/// Hash wildcard (#) used not at the end of the filter
	#[error(
		"Invalid topic filter '{filter}': # wildcard can only be the last \
		 segment"
	)]
	HashPosition { filter: String },

	/// Wildcard characters (+ or #) mixed with other characters in a level
	#[error("Invalid wildcard usage: {usage}")]
	WildcardUsage { usage: String },

	/// Filter exceeds the protocol length limit
	#[error("Topic filter is {len} bytes long, the limit is {limit}")]
	TooLong { len: usize, limit: usize },

	/// Empty filter is not valid
	#[error("Topic filter cannot be empty")]
	EmptyFilter,
}

impl TopicFilterError {
	/// Creates a new HashPosition error
	pub fn hash_position(filter: impl Into<String>) -> Self {
		Self::HashPosition {
			filter: filter.into(),
		}
	}

	/// Creates a new WildcardUsage error
	pub fn wildcard_usage(usage: impl Into<String>) -> Self {
		Self::WildcardUsage {
			usage: usage.into(),
		}
	}

	/// Returns the error type for categorization
	pub fn error_type(&self) -> &'static str {
		match self {
			| TopicFilterError::HashPosition { .. } => "hash_position",
			| TopicFilterError::WildcardUsage { .. } => "wildcard_usage",
			| TopicFilterError::TooLong { .. } => "filter_too_long",
			| TopicFilterError::EmptyFilter => "empty_filter",
		}
	}
}
