use std::any::Any;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::task::JoinError;

use crate::message::PublishMessage;
use crate::message_adapter::{AdaptError, BoxError};
use crate::topic::{Topic, TopicFilterError};

/// Error returned by a subscriber handler
pub type HandlerError = BoxError;

/// Errors raised while assembling the subscriber registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
	/// The filter string is not a valid topic filter
	#[error("Invalid topic filter: {0}")]
	InvalidFilter(#[from] TopicFilterError),

	/// The same filter was registered twice
	#[error("Topic filter '{filter}' is already registered")]
	DuplicateFilter { filter: String },
}

impl RegistryError {
	/// Returns the error type for categorization
	pub fn error_type(&self) -> &'static str {
		match self {
			| RegistryError::InvalidFilter(_) => "invalid_filter",
			| RegistryError::DuplicateFilter { .. } => "duplicate_filter",
		}
	}
}

/// Errors raised while constructing a dispatcher
#[derive(Error, Debug)]
pub enum DispatcherError {
	/// The dedicated pool for deferred handlers could not be started
	#[error("Failed to start deferred execution pool: {0}")]
	DeferredPool(#[from] std::io::Error),
}

/// Classification of a failed dispatch, surfaced to the error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchErrorKind {
	/// No registered filter matches the topic
	NoMatch,
	/// The payload could not be mapped into the target structure
	PayloadMapping,
	/// The payload was not well-formed in its wire format
	PayloadParse,
	/// Any other adaptation or invocation failure
	Generic,
}

impl DispatchErrorKind {
	/// Human readable reason appended to the error message, if any
	pub fn reason(&self) -> Option<&'static str> {
		match self {
			| DispatchErrorKind::NoMatch => Some("no subscriber found"),
			| DispatchErrorKind::PayloadMapping => {
				Some("failed to map payload to target class")
			}
			| DispatchErrorKind::PayloadParse => Some("failed to parse payload"),
			| DispatchErrorKind::Generic => None,
		}
	}

	/// Stable label usable in logs and metrics
	pub fn as_str(&self) -> &'static str {
		match self {
			| DispatchErrorKind::NoMatch => "no_match",
			| DispatchErrorKind::PayloadMapping => "payload_mapping",
			| DispatchErrorKind::PayloadParse => "payload_parse",
			| DispatchErrorKind::Generic => "generic",
		}
	}
}

impl fmt::Display for DispatchErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Cause of a failed dispatch.
#[derive(Error, Debug)]
pub enum DispatchFailure {
	/// No registered filter matches the topic
	#[error("No subscriber found for topic {topic}")]
	NoMatch { topic: Topic },

	/// The message adapter could not produce an argument
	#[error(transparent)]
	Adapt(#[from] AdaptError),

	/// The handler returned an error
	#[error("Subscriber handler failed: {0}")]
	Handler(#[source] HandlerError),

	/// The handler panicked
	#[error("Subscriber handler panicked: {message}")]
	Panic { message: String },

	/// A deferred handler did not complete within the configured wait
	#[error("Deferred handler did not complete within {timeout:?}")]
	DeferredTimeout { timeout: Duration },

	/// The deferred task was cancelled before completing
	#[error("Deferred handler task failed: {0}")]
	DeferredTask(#[source] JoinError),

	/// A deferred subscriber was resolved without a deferred pool
	#[error("No deferred execution pool available for filter '{filter}'")]
	DeferredPoolUnavailable { filter: String },
}

impl DispatchFailure {
	pub fn no_match(topic: &Topic) -> Self {
		Self::NoMatch {
			topic: topic.clone(),
		}
	}

	/// Builds a panic failure from an unwind payload.
	pub fn panic(payload: Box<dyn Any + Send>) -> Self {
		let message = if let Some(s) = payload.downcast_ref::<&str>() {
			(*s).to_string()
		} else if let Some(s) = payload.downcast_ref::<String>() {
			s.clone()
		} else {
			"non-string panic payload".to_string()
		};
		Self::Panic { message }
	}

	/// Classifies this failure for the error handler
	pub fn kind(&self) -> DispatchErrorKind {
		match self {
			| DispatchFailure::NoMatch { .. } => DispatchErrorKind::NoMatch,
			| DispatchFailure::Adapt(AdaptError::Mapping { .. }) => {
				DispatchErrorKind::PayloadMapping
			}
			| DispatchFailure::Adapt(AdaptError::Parse { .. }) => {
				DispatchErrorKind::PayloadParse
			}
			| _ => DispatchErrorKind::Generic,
		}
	}

	/// Returns the error type for categorization
	pub fn error_type(&self) -> &'static str {
		match self {
			| DispatchFailure::NoMatch { .. } => "no_match",
			| DispatchFailure::Adapt(err) => err.error_type(),
			| DispatchFailure::Handler(_) => "handler_failed",
			| DispatchFailure::Panic { .. } => "handler_panicked",
			| DispatchFailure::DeferredTimeout { .. } => "deferred_timeout",
			| DispatchFailure::DeferredTask(_) => "deferred_task_failed",
			| DispatchFailure::DeferredPoolUnavailable { .. } => {
				"deferred_pool_unavailable"
			}
		}
	}
}

/// A classified dispatch failure for one message.
///
/// Built once per failed dispatch and handed by value to the
/// [`MqttMessageErrorHandler`](super::MqttMessageErrorHandler).
#[derive(Error, Debug)]
#[error("{message}")]
pub struct MqttMessageError {
	topic: Topic,
	payload: Bytes,
	message: String,
	kind: DispatchErrorKind,
	#[source]
	cause: DispatchFailure,
}

impl MqttMessageError {
	pub fn new(publish: &PublishMessage, cause: DispatchFailure) -> Self {
		let kind = cause.kind();
		let message = match kind.reason() {
			| Some(reason) => format!(
				"Error while handling mqtt message on topic [{}]: {}",
				publish.topic, reason
			),
			| None => format!(
				"Error while handling mqtt message on topic [{}]",
				publish.topic
			),
		};
		Self {
			topic: publish.topic.clone(),
			payload: publish.payload.clone(),
			message,
			kind,
			cause,
		}
	}

	pub fn topic(&self) -> &Topic {
		&self.topic
	}

	pub fn payload(&self) -> &Bytes {
		&self.payload
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn kind(&self) -> DispatchErrorKind {
		self.kind
	}

	pub fn cause(&self) -> &DispatchFailure {
		&self.cause
	}

	pub fn into_cause(self) -> DispatchFailure {
		self.cause
	}
}
