//! # MQTT Typed Dispatch
//!
//! The message-dispatch core of an MQTT subscriber-routing layer. Given a
//! publish received on a concrete topic, it finds the registered subscriber
//! whose topic filter matches, adapts the payload into the arguments that
//! subscriber declared, invokes it and keeps going whatever happens to that
//! one message.
//!
//! ## Features
//!
//! - **Wildcard Routing**: MQTT topic filters with `+` and `#`, first match in
//!   registration order wins
//! - **Two-level Caching**: bounded LRU from topic to subscriber, plus one
//!   memoized invoker per filter
//! - **Direct and Deferred Handlers**: plain closures run on the receiving
//!   thread, async handlers run on a dedicated pool while the receiving
//!   thread waits
//! - **Failure Isolation**: every failure becomes an [`MqttMessageError`]
//!   delivered to one pluggable [`MqttMessageErrorHandler`]
//! - **Observability Decorators**: message/error counters and connect timing
//!   via `prometheus` (feature `metrics`), spans via `tracing`, and a count
//!   of unexpected broker disconnects
//!
//! ## Quick Start
//!
//! ```rust
//! use mqtt_typed_dispatch::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Reading {
//!     v: f64,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SubscriberRegistry::builder()
//!         .direct(
//!             "sensors/+/temp",
//!             [ParamType::json::<Reading>(), ParamType::Topic],
//!             |mut args| {
//!                 let reading = args.take::<Reading>(0)?;
//!                 let topic = args.take::<Topic>(1)?;
//!                 println!("{topic}: {}", reading.v);
//!                 Ok(())
//!             },
//!         )?
//!         .build();
//!
//!     let dispatcher = Dispatcher::new(registry)?;
//!     dispatcher.handle(&PublishMessage::try_new(
//!         "sensors/3/temp",
//!         r#"{"v":21.5}"#,
//!     )?);
//!     Ok(())
//! }
//! ```
//!
//! ## Pattern Matching
//!
//! - `+` matches exactly one topic level (e.g., `sensors/+/temp`)
//! - `#` matches the remaining levels, including none (e.g., `sensors/#`
//!   matches `sensors`)
//! - Empty levels are significant: `a//b` has three levels
//!
//! ## Error Classification
//!
//! Failures reach the error handler with a human readable message built
//! from the topic and a reason:
//!
//! - no subscriber found
//! - failed to map payload to target class
//! - failed to parse payload
//!
//! Handler errors and panics carry no reason, the cause is attached instead.

#![warn(missing_docs)]

// Core modules
pub mod config;
pub mod connector;
pub mod message;
pub mod message_adapter;
pub mod observability;
pub mod routing;
pub mod topic;

// === Core Public API ===
pub use config::DispatcherConfig;
pub use connector::{
	ConnectorError, DisconnectListener, DisconnectSource, MqttConnector,
};
pub use message::PublishMessage;
pub use message_adapter::{
	AdaptError, Argument, ArgumentError, Arguments, JsonMessageAdapter,
	MessageAdapter, ParamType,
};
pub use routing::{
	DispatchErrorKind, Dispatcher, DispatcherBuilder, ExecutionMode,
	LoggingErrorHandler, MqttHandler, MqttMessageError,
	MqttMessageErrorHandler, SubscriberRegistry,
};
pub use topic::{Topic, TopicFilter};

// Essential external types
pub use rumqttc::QoS;

/// Prelude module for convenient imports
///
/// ```rust
/// use mqtt_typed_dispatch::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for registering subscribers and dispatching messages

	pub use crate::routing::HandlerError;
	pub use crate::{
		Arguments, Dispatcher, DispatcherConfig, MqttHandler,
		MqttMessageError, MqttMessageErrorHandler, ParamType, PublishMessage,
		QoS, SubscriberRegistry, Topic,
	};
}

/// Advanced types for custom adapters, caches and decorators
pub mod advanced {
	//! Building blocks below the dispatcher

	pub use crate::routing::{
		DeferredExecutor, DispatchFailure, FnErrorHandler, InvocationCache,
		Invoker, SubscriberDescriptor, SubscriberRegistryBuilder,
		SubscriberTarget, TopicResolutionCache,
	};
	pub use crate::connector::{FnDisconnectListener, LoggingDisconnectListener};
	pub use crate::topic::{TopicFilterItem, limits, matches, validation};
}

/// Error types used throughout the library
///
/// ```rust
/// use mqtt_typed_dispatch::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::connector::ConnectorError;
	pub use crate::message_adapter::{AdaptError, ArgumentError, BoxError};
	pub use crate::routing::{
		DispatchErrorKind, DispatchFailure, DispatcherError, HandlerError,
		MqttMessageError, RegistryError,
	};
	pub use crate::topic::{TopicError, TopicFilterError};
}
