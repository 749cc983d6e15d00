//! Conversion of an incoming publish into handler arguments.
//!
//! Every subscriber declares an ordered list of [`ParamType`]s when it is
//! registered. For each declared parameter the dispatcher asks a
//! [`MessageAdapter`] for one [`Argument`], then hands the ordered
//! [`Arguments`] to the handler, which takes them back out with their
//! concrete types.
//!
//! JSON targets carry a decoder monomorphised at registration time
//! ([`ParamType::json`]), so no runtime type introspection is needed.

use std::any::{Any, type_name};
use std::error::Error as StdError;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::error::Category;
use smallvec::SmallVec;
use thiserror::Error;

use crate::message::PublishMessage;

/// Boxed error used for opaque failure causes
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Decodes a JSON payload into a type-erased argument
type JsonDecodeFn = fn(&[u8]) -> Result<Argument, serde_json::Error>;

/// A JSON-decodable parameter target.
#[derive(Clone, Copy)]
pub struct JsonTarget {
	type_name: &'static str,
	decode: JsonDecodeFn,
}

impl JsonTarget {
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn decode(&self, payload: &[u8]) -> Result<Argument, serde_json::Error> {
		(self.decode)(payload)
	}
}

impl fmt::Debug for JsonTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("JsonTarget").field(&self.type_name).finish()
	}
}

fn decode_json<T>(payload: &[u8]) -> Result<Argument, serde_json::Error>
where T: DeserializeOwned + Send + 'static {
	serde_json::from_slice::<T>(payload).map(Argument::new)
}

/// Declared type of one handler parameter.
#[derive(Debug, Clone, Copy)]
pub enum ParamType {
	/// The concrete [`Topic`](crate::topic::Topic)
	Topic,
	/// A clone of the whole [`PublishMessage`]
	Message,
	/// Payload decoded as UTF-8 into a `String`
	Text,
	/// Raw payload as [`bytes::Bytes`]
	Bytes,
	/// Delivery [`QoS`](rumqttc::QoS)
	Qos,
	/// Retain flag as `bool`
	Retained,
	/// Payload deserialized from JSON
	Json(JsonTarget),
}

impl ParamType {
	/// JSON payload parameter deserialized into `T`.
	pub fn json<T>() -> Self
	where T: DeserializeOwned + Send + 'static {
		ParamType::Json(JsonTarget {
			type_name: type_name::<T>(),
			decode: decode_json::<T>,
		})
	}

	/// Name of the Rust type the adapter produces for this parameter
	pub fn type_name(&self) -> &'static str {
		match self {
			| ParamType::Topic => type_name::<crate::topic::Topic>(),
			| ParamType::Message => type_name::<PublishMessage>(),
			| ParamType::Text => type_name::<String>(),
			| ParamType::Bytes => type_name::<bytes::Bytes>(),
			| ParamType::Qos => type_name::<rumqttc::QoS>(),
			| ParamType::Retained => type_name::<bool>(),
			| ParamType::Json(target) => target.type_name(),
		}
	}
}

impl PartialEq for ParamType {
	fn eq(&self, other: &Self) -> bool {
		std::mem::discriminant(self) == std::mem::discriminant(other)
			&& self.type_name() == other.type_name()
	}
}

impl Eq for ParamType {}

/// A single adapted, type-erased handler argument.
pub struct Argument {
	value: Box<dyn Any + Send>,
	type_name: &'static str,
}

impl Argument {
	pub fn new<T: Any + Send>(value: T) -> Self {
		Self {
			value: Box::new(value),
			type_name: type_name::<T>(),
		}
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn is<T: Any>(&self) -> bool {
		self.value.is::<T>()
	}

	/// Recovers the concrete value, handing the argument back on mismatch.
	pub fn downcast<T: Any>(self) -> Result<T, Self> {
		let type_name = self.type_name;
		self.value
			.downcast::<T>()
			.map(|value| *value)
			.map_err(|value| Self { value, type_name })
	}
}

impl fmt::Debug for Argument {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Argument").field(&self.type_name).finish()
	}
}

/// Errors raised while a handler extracts its typed arguments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
	/// No argument at this position, or it was already taken
	#[error("Missing argument at position {index}")]
	Missing { index: usize },

	/// The argument exists but has a different type
	#[error(
		"Argument at position {index} is {actual}, handler expected \
		 {expected}"
	)]
	TypeMismatch {
		index: usize,
		expected: &'static str,
		actual: &'static str,
	},
}

/// Ordered arguments adapted for one handler invocation.
#[derive(Debug, Default)]
pub struct Arguments {
	values: SmallVec<[Option<Argument>; 3]>,
}

impl Arguments {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, argument: Argument) {
		self.values.push(Some(argument));
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Moves the argument at `index` out as a `T`.
	pub fn take<T: Any>(&mut self, index: usize) -> Result<T, ArgumentError> {
		let slot = self
			.values
			.get_mut(index)
			.ok_or(ArgumentError::Missing { index })?;
		let argument = slot.take().ok_or(ArgumentError::Missing { index })?;
		argument.downcast::<T>().map_err(|argument| {
			let actual = argument.type_name();
			*slot = Some(argument);
			ArgumentError::TypeMismatch {
				index,
				expected: type_name::<T>(),
				actual,
			}
		})
	}
}

impl FromIterator<Argument> for Arguments {
	fn from_iter<I: IntoIterator<Item = Argument>>(iter: I) -> Self {
		Self {
			values: iter.into_iter().map(Some).collect(),
		}
	}
}

/// Errors raised by a [`MessageAdapter`]
#[derive(Error, Debug)]
pub enum AdaptError {
	/// Payload is well-formed but does not fit the target structure
	#[error("Failed to map payload to {target}: {source}")]
	Mapping {
		target: &'static str,
		#[source]
		source: BoxError,
	},

	/// Payload is not well-formed in its expected wire format
	#[error("Failed to parse payload as {target}: {source}")]
	Parse {
		target: &'static str,
		#[source]
		source: BoxError,
	},

	/// The adapter has no conversion for this parameter type
	#[error("Unsupported parameter type {target}")]
	Unsupported { target: &'static str },

	/// Any other adapter failure
	#[error("Failed to adapt payload to {target}: {source}")]
	Other {
		target: &'static str,
		#[source]
		source: BoxError,
	},
}

impl AdaptError {
	pub fn mapping(target: &'static str, source: impl Into<BoxError>) -> Self {
		Self::Mapping {
			target,
			source: source.into(),
		}
	}

	pub fn parse(target: &'static str, source: impl Into<BoxError>) -> Self {
		Self::Parse {
			target,
			source: source.into(),
		}
	}

	pub fn other(target: &'static str, source: impl Into<BoxError>) -> Self {
		Self::Other {
			target,
			source: source.into(),
		}
	}

	/// Classifies a serde_json failure into mapping vs parse errors.
	pub fn from_json(target: &'static str, err: serde_json::Error) -> Self {
		match err.classify() {
			| Category::Data => Self::mapping(target, err),
			| Category::Syntax | Category::Eof => Self::parse(target, err),
			| Category::Io => Self::other(target, err),
		}
	}

	/// Returns the error type for categorization
	pub fn error_type(&self) -> &'static str {
		match self {
			| AdaptError::Mapping { .. } => "payload_mapping",
			| AdaptError::Parse { .. } => "payload_parse",
			| AdaptError::Unsupported { .. } => "unsupported_parameter",
			| AdaptError::Other { .. } => "adapt_failed",
		}
	}
}

/// Produces one handler argument from a message for a declared type.
///
/// Called once per declared parameter, in declared order. Implementations
/// are shared between all transport threads.
pub trait MessageAdapter: Send + Sync + 'static {
	fn adapt(
		&self,
		message: &PublishMessage,
		target: &ParamType,
	) -> Result<Argument, AdaptError>;
}

/// Default adapter: metadata parameters come straight from the message,
/// structured payloads are decoded with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMessageAdapter;

impl JsonMessageAdapter {
	pub fn new() -> Self {
		Self
	}
}

impl MessageAdapter for JsonMessageAdapter {
	fn adapt(
		&self,
		message: &PublishMessage,
		target: &ParamType,
	) -> Result<Argument, AdaptError> {
		let argument = match target {
			| ParamType::Topic => Argument::new(message.topic.clone()),
			| ParamType::Message => Argument::new(message.clone()),
			| ParamType::Bytes => Argument::new(message.payload.clone()),
			| ParamType::Qos => Argument::new(message.qos),
			| ParamType::Retained => Argument::new(message.retained),
			| ParamType::Text => {
				let text = std::str::from_utf8(&message.payload)
					.map_err(|err| AdaptError::parse(target.type_name(), err))?;
				Argument::new(text.to_owned())
			}
			| ParamType::Json(json) => json
				.decode(&message.payload)
				.map_err(|err| AdaptError::from_json(json.type_name(), err))?,
		};
		Ok(argument)
	}
}
