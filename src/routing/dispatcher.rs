use std::sync::Arc;

use tracing::trace;

use super::error::{DispatchFailure, DispatcherError, MqttMessageError};
use super::error_handler::{LoggingErrorHandler, MqttMessageErrorHandler};
use super::invoker::{DeferredExecutor, InvocationCache};
use super::resolution_cache::TopicResolutionCache;
use super::subscriber::SubscriberRegistry;
use crate::config::DispatcherConfig;
use crate::message::PublishMessage;
use crate::message_adapter::{Arguments, JsonMessageAdapter, MessageAdapter};

/// Consumes received messages and forwards them to the right subscriber.
///
/// Implementations never fail towards their caller: whatever goes wrong
/// with one message is reported elsewhere and the next message is handled
/// normally.
pub trait MqttHandler: Send + Sync {
	fn handle(&self, message: &PublishMessage);
}

impl<H: MqttHandler + ?Sized> MqttHandler for Arc<H> {
	fn handle(&self, message: &PublishMessage) {
		(**self).handle(message)
	}
}

impl<H: MqttHandler + ?Sized> MqttHandler for Box<H> {
	fn handle(&self, message: &PublishMessage) {
		(**self).handle(message)
	}
}

/// Resolves, adapts, invokes and isolates failures for each message.
///
/// Safe to share between transport threads; no lock serializes dispatch.
pub struct Dispatcher<A = JsonMessageAdapter, E = LoggingErrorHandler> {
	resolution_cache: TopicResolutionCache,
	invocation_cache: InvocationCache,
	adapter: A,
	error_handler: E,
}

impl Dispatcher {
	/// Dispatcher with the default adapter, error handler and settings.
	pub fn new(registry: SubscriberRegistry) -> Result<Self, DispatcherError> {
		Self::builder(registry).build()
	}

	pub fn builder(registry: SubscriberRegistry) -> DispatcherBuilder {
		DispatcherBuilder::new(registry)
	}
}

impl<A, E> Dispatcher<A, E>
where
	A: MessageAdapter,
	E: MqttMessageErrorHandler,
{
	fn dispatch(&self, message: &PublishMessage) -> Result<(), DispatchFailure> {
		let descriptor = self.resolution_cache.resolve(&message.topic)?;
		let invoker = self.invocation_cache.invoker_for(&descriptor)?;
		let args = descriptor
			.parameter_types()
			.iter()
			.map(|target| self.adapter.adapt(message, target))
			.collect::<Result<Arguments, _>>()?;
		invoker.invoke(args)
	}

	pub fn resolution_cache(&self) -> &TopicResolutionCache {
		&self.resolution_cache
	}

	pub fn invocation_cache(&self) -> &InvocationCache {
		&self.invocation_cache
	}

	pub fn adapter(&self) -> &A {
		&self.adapter
	}

	pub fn error_handler(&self) -> &E {
		&self.error_handler
	}
}

impl<A, E> MqttHandler for Dispatcher<A, E>
where
	A: MessageAdapter,
	E: MqttMessageErrorHandler,
{
	fn handle(&self, message: &PublishMessage) {
		trace!(
			topic = %message.topic,
			payload_size = message.payload_len(),
			"Received mqtt message"
		);
		if let Err(failure) = self.dispatch(message) {
			self.error_handler
				.handle(MqttMessageError::new(message, failure));
		}
	}
}

/// Immutable builder for configuring a [`Dispatcher`]
pub struct DispatcherBuilder<A = JsonMessageAdapter, E = LoggingErrorHandler> {
	registry: SubscriberRegistry,
	config: DispatcherConfig,
	adapter: A,
	error_handler: E,
}

impl DispatcherBuilder {
	pub fn new(registry: SubscriberRegistry) -> Self {
		Self {
			registry,
			config: DispatcherConfig::default(),
			adapter: JsonMessageAdapter,
			error_handler: LoggingErrorHandler,
		}
	}
}

impl<A, E> DispatcherBuilder<A, E>
where
	A: MessageAdapter,
	E: MqttMessageErrorHandler,
{
	/// Set dispatcher configuration
	pub fn with_config(self, config: DispatcherConfig) -> Self {
		Self { config, ..self }
	}

	/// Replace the message adapter
	pub fn with_adapter<A2: MessageAdapter>(
		self,
		adapter: A2,
	) -> DispatcherBuilder<A2, E> {
		DispatcherBuilder {
			registry: self.registry,
			config: self.config,
			adapter,
			error_handler: self.error_handler,
		}
	}

	/// Replace the error handler
	pub fn with_error_handler<E2: MqttMessageErrorHandler>(
		self,
		error_handler: E2,
	) -> DispatcherBuilder<A, E2> {
		DispatcherBuilder {
			registry: self.registry,
			config: self.config,
			adapter: self.adapter,
			error_handler,
		}
	}

	/// Builds the dispatcher, starting the deferred pool only when at least
	/// one subscriber needs it.
	pub fn build(self) -> Result<Dispatcher<A, E>, DispatcherError> {
		let executor = if self.registry.has_deferred() {
			Some(Arc::new(DeferredExecutor::new(
				self.config.deferred_workers,
				self.config.deferred_timeout,
			)?))
		} else {
			None
		};
		let capacity =
			self.config.effective_topic_cache_size(self.registry.len());
		let invocation_cache =
			InvocationCache::new(self.registry.len(), executor);
		Ok(Dispatcher {
			resolution_cache: TopicResolutionCache::new(self.registry, capacity),
			invocation_cache,
			adapter: self.adapter,
			error_handler: self.error_handler,
		})
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use parking_lot::Mutex;
	use serde::Deserialize;

	use super::*;
	use crate::message_adapter::ParamType;
	use crate::routing::error::{DispatchErrorKind, HandlerError};
	use crate::routing::error_handler::FnErrorHandler;
	use crate::routing::subscriber::ExecutionMode;
	use crate::topic::Topic;

	#[derive(Debug, Deserialize, PartialEq)]
	struct Reading {
		v: f64,
	}

	type Seen = Arc<Mutex<Vec<(String, DispatchErrorKind)>>>;

	fn recording_handler()
	-> (Seen, FnErrorHandler<impl Fn(MqttMessageError) + Send + Sync>) {
		let seen: Seen = Arc::default();
		let sink = Arc::clone(&seen);
		let handler = FnErrorHandler(move |err: MqttMessageError| {
			sink.lock().push((err.topic().to_string(), err.kind()))
		});
		(seen, handler)
	}

	#[test]
	fn test_dispatches_adapted_arguments_in_declared_order() {
		let received = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&received);
		let registry = SubscriberRegistry::builder()
			.direct(
				"sensors/+/temp",
				[ParamType::json::<Reading>(), ParamType::Topic],
				move |mut args| {
					let reading = args.take::<Reading>(0)?;
					let topic = args.take::<Topic>(1)?;
					sink.lock().push((topic.to_string(), reading.v));
					Ok(())
				},
			)
			.unwrap()
			.build();
		let (errors, error_handler) = recording_handler();
		let dispatcher = Dispatcher::builder(registry)
			.with_error_handler(error_handler)
			.build()
			.unwrap();

		dispatcher
			.handle(&PublishMessage::try_new("sensors/3/temp", r#"{"v":21.5}"#).unwrap());

		assert_eq!(*received.lock(), vec![("sensors/3/temp".to_string(), 21.5)]);
		assert!(errors.lock().is_empty());
		assert_eq!(dispatcher.invocation_cache().len(), 1);
		assert!(dispatcher.invocation_cache().executor().is_none());
	}

	#[test]
	fn test_unmatched_topic_reports_no_match_once() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let registry = SubscriberRegistry::builder()
			.direct("sensors/+/temp", [], move |_| {
				counter.fetch_add(1, Ordering::SeqCst);
				Ok(())
			})
			.unwrap()
			.build();
		let (errors, error_handler) = recording_handler();
		let dispatcher = Dispatcher::builder(registry)
			.with_error_handler(error_handler)
			.build()
			.unwrap();

		dispatcher
			.handle(&PublishMessage::try_new("sensors/3/humidity", "{}").unwrap());

		assert_eq!(calls.load(Ordering::SeqCst), 0);
		assert_eq!(
			*errors.lock(),
			vec![("sensors/3/humidity".to_string(), DispatchErrorKind::NoMatch)]
		);
		assert!(dispatcher.invocation_cache().is_empty());
	}

	#[test]
	fn test_payload_errors_are_classified() {
		let registry = SubscriberRegistry::builder()
			.json::<Reading, _>("sensors/+/temp", |_| Ok(()))
			.unwrap()
			.build();
		let (errors, error_handler) = recording_handler();
		let dispatcher = Dispatcher::builder(registry)
			.with_error_handler(error_handler)
			.build()
			.unwrap();

		dispatcher.handle(&PublishMessage::try_new("sensors/1/temp", "{").unwrap());
		dispatcher
			.handle(&PublishMessage::try_new("sensors/2/temp", r#"{"v":"hot"}"#).unwrap());

		let kinds: Vec<_> = errors.lock().iter().map(|(_, kind)| *kind).collect();
		assert_eq!(
			kinds,
			vec![DispatchErrorKind::PayloadParse, DispatchErrorKind::PayloadMapping]
		);
	}

	#[test]
	fn test_handler_failure_is_isolated() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let registry = SubscriberRegistry::builder()
			.direct("bad/#", [], |_| Err::<(), HandlerError>("broken".into()))
			.unwrap()
			.direct("panics", [], |_| panic!("handler bug"))
			.unwrap()
			.direct("good", [], move |_| {
				counter.fetch_add(1, Ordering::SeqCst);
				Ok(())
			})
			.unwrap()
			.build();
		let (errors, error_handler) = recording_handler();
		let dispatcher = Dispatcher::builder(registry)
			.with_error_handler(error_handler)
			.build()
			.unwrap();

		dispatcher.handle(&PublishMessage::try_new("bad/1", "").unwrap());
		dispatcher.handle(&PublishMessage::try_new("good", "").unwrap());
		dispatcher.handle(&PublishMessage::try_new("panics", "").unwrap());
		dispatcher.handle(&PublishMessage::try_new("good", "").unwrap());

		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert_eq!(
			*errors.lock(),
			vec![
				("bad/1".to_string(), DispatchErrorKind::Generic),
				("panics".to_string(), DispatchErrorKind::Generic),
			]
		);
	}

	#[test]
	fn test_deferred_subscriber_starts_pool() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let registry = SubscriberRegistry::builder()
			.deferred("jobs/+", [ParamType::Text], move |mut args| {
				let counter = Arc::clone(&counter);
				async move {
					let text = args.take::<String>(0)?;
					counter.fetch_add(text.len(), Ordering::SeqCst);
					Ok::<(), HandlerError>(())
				}
			})
			.unwrap()
			.build();
		let dispatcher = Dispatcher::builder(registry)
			.with_config(DispatcherConfig::new().with_deferred_workers(1))
			.build()
			.unwrap();

		dispatcher.handle(&PublishMessage::try_new("jobs/1", "abcd").unwrap());

		assert_eq!(calls.load(Ordering::SeqCst), 4);
		let descriptor = dispatcher
			.resolution_cache()
			.resolve(&Topic::new("jobs/1").unwrap())
			.unwrap();
		assert_eq!(descriptor.execution_mode(), ExecutionMode::Deferred);
		assert!(dispatcher.invocation_cache().executor().is_some());
	}

	#[test]
	fn test_disabled_cache_still_dispatches() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let registry = SubscriberRegistry::builder()
			.direct("a/#", [], move |_| {
				counter.fetch_add(1, Ordering::SeqCst);
				Ok(())
			})
			.unwrap()
			.build();
		let dispatcher = Dispatcher::builder(registry)
			.with_config(DispatcherConfig::new().with_topic_cache_size(-1))
			.build()
			.unwrap();

		for _ in 0 .. 3 {
			dispatcher.handle(&PublishMessage::try_new("a/b", "").unwrap());
		}
		assert_eq!(calls.load(Ordering::SeqCst), 3);
		assert_eq!(dispatcher.resolution_cache().capacity(), 0);
		assert!(dispatcher.resolution_cache().is_empty());
	}

	#[test]
	fn test_unbounded_cache_size_builds() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let registry = SubscriberRegistry::builder()
			.direct("a/#", [], move |_| {
				counter.fetch_add(1, Ordering::SeqCst);
				Ok(())
			})
			.unwrap()
			.build();
		let dispatcher = Dispatcher::builder(registry)
			.with_config(DispatcherConfig::new().with_topic_cache_size(i64::MAX))
			.build()
			.unwrap();

		dispatcher.handle(&PublishMessage::try_new("a/b", "").unwrap());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(dispatcher.resolution_cache().len(), 1);
		assert_eq!(dispatcher.resolution_cache().capacity(), i64::MAX as usize);
	}
}
