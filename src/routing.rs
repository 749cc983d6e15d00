//! Message routing and dispatch module
//!
//! This module resolves incoming topics to registered subscribers, adapts
//! payloads into handler arguments, invokes handlers in their execution mode
//! and reports every failure to a single error handler.

pub mod dispatcher;
/// Routing and dispatch error types
pub mod error;
pub mod error_handler;
pub mod invoker;
pub mod resolution_cache;
/// Subscriber descriptors and the registry they live in
pub mod subscriber;

// Re-export commonly used types for convenience
pub use dispatcher::{Dispatcher, DispatcherBuilder, MqttHandler};
pub use error::{
	DispatchErrorKind, DispatchFailure, DispatcherError, HandlerError,
	MqttMessageError, RegistryError,
};
pub use error_handler::{
	FnErrorHandler, LoggingErrorHandler, MqttMessageErrorHandler,
};
pub use invoker::{DeferredExecutor, InvocationCache, Invoker};
pub use resolution_cache::TopicResolutionCache;
pub use subscriber::{
	ExecutionMode, SubscriberDescriptor, SubscriberRegistry,
	SubscriberRegistryBuilder, SubscriberTarget,
};
