use std::fmt;
use std::future::Future;
use std::slice::Iter;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::{HandlerError, RegistryError};
use crate::message_adapter::{Arguments, ParamType};
use crate::topic::{Topic, TopicFilter};

/// Handler executed synchronously on the dispatching thread
pub type DirectHandlerFn =
	dyn Fn(Arguments) -> Result<(), HandlerError> + Send + Sync;

/// Handler whose future is driven on the dedicated deferred pool
pub type DeferredHandlerFn = dyn Fn(Arguments) -> BoxFuture<'static, Result<(), HandlerError>>
	+ Send
	+ Sync;

/// How a subscriber's handler is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
	/// Runs on the calling thread
	Direct,
	/// Runs on a separate pool while the calling thread waits for it
	Deferred,
}

/// The callable bound to a filter, tagged by execution mode.
#[derive(Clone)]
pub enum SubscriberTarget {
	Direct(Arc<DirectHandlerFn>),
	Deferred(Arc<DeferredHandlerFn>),
}

impl SubscriberTarget {
	pub fn execution_mode(&self) -> ExecutionMode {
		match self {
			| SubscriberTarget::Direct(_) => ExecutionMode::Direct,
			| SubscriberTarget::Deferred(_) => ExecutionMode::Deferred,
		}
	}
}

impl fmt::Debug for SubscriberTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SubscriberTarget::{:?}", self.execution_mode())
	}
}

/// Immutable binding of a topic filter to a handler and the argument types
/// it expects.
#[derive(Debug)]
pub struct SubscriberDescriptor {
	filter: TopicFilter,
	target: SubscriberTarget,
	parameter_types: Vec<ParamType>,
}

impl SubscriberDescriptor {
	pub fn new(
		filter: TopicFilter,
		target: SubscriberTarget,
		parameter_types: Vec<ParamType>,
	) -> Self {
		Self {
			filter,
			target,
			parameter_types,
		}
	}

	pub fn filter(&self) -> &TopicFilter {
		&self.filter
	}

	pub fn target(&self) -> &SubscriberTarget {
		&self.target
	}

	pub fn parameter_types(&self) -> &[ParamType] {
		&self.parameter_types
	}

	pub fn execution_mode(&self) -> ExecutionMode {
		self.target.execution_mode()
	}
}

/// Immutable, ordered snapshot of all subscribers.
///
/// Cloning shares the same snapshot. Iteration follows registration order,
/// which is also the tie-break when several filters match one topic.
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
	subscribers: Arc<[Arc<SubscriberDescriptor>]>,
}

impl SubscriberRegistry {
	pub fn builder() -> SubscriberRegistryBuilder {
		SubscriberRegistryBuilder::new()
	}

	pub fn len(&self) -> usize {
		self.subscribers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.subscribers.is_empty()
	}

	pub fn iter(&self) -> Iter<'_, Arc<SubscriberDescriptor>> {
		self.subscribers.iter()
	}

	pub fn has_deferred(&self) -> bool {
		self.subscribers
			.iter()
			.any(|s| s.execution_mode() == ExecutionMode::Deferred)
	}

	/// Scans in registration order and returns the first matching subscriber.
	pub fn find_first_match(
		&self,
		topic: &Topic,
	) -> Option<&Arc<SubscriberDescriptor>> {
		self.subscribers.iter().find(|s| s.filter().matches(topic))
	}
}

impl<'a> IntoIterator for &'a SubscriberRegistry {
	type IntoIter = Iter<'a, Arc<SubscriberDescriptor>>;
	type Item = &'a Arc<SubscriberDescriptor>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

/// Explicit registration step producing a [`SubscriberRegistry`].
///
/// Filters are validated when added. Registering the same filter string
/// twice is rejected; a filter fully covered by an earlier one is accepted
/// but reported, since first-match-wins makes it unreachable.
#[derive(Debug, Default)]
pub struct SubscriberRegistryBuilder {
	subscribers: Vec<Arc<SubscriberDescriptor>>,
}

impl SubscriberRegistryBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a handler that runs on the dispatching thread.
	pub fn direct<F>(
		self,
		filter: &str,
		parameter_types: impl IntoIterator<Item = ParamType>,
		handler: F,
	) -> Result<Self, RegistryError>
	where
		F: Fn(Arguments) -> Result<(), HandlerError> + Send + Sync + 'static,
	{
		self.add(
			filter,
			SubscriberTarget::Direct(Arc::new(handler)),
			parameter_types,
		)
	}

	/// Registers an async handler driven on the deferred pool.
	pub fn deferred<F, Fut>(
		self,
		filter: &str,
		parameter_types: impl IntoIterator<Item = ParamType>,
		handler: F,
	) -> Result<Self, RegistryError>
	where
		F: Fn(Arguments) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
	{
		let target = SubscriberTarget::Deferred(Arc::new(move |args: Arguments| {
			handler(args).boxed()
		}));
		self.add(filter, target, parameter_types)
	}

	/// Registers a direct handler taking the payload decoded from JSON.
	pub fn json<T, F>(self, filter: &str, handler: F) -> Result<Self, RegistryError>
	where
		T: DeserializeOwned + Send + 'static,
		F: Fn(T) -> Result<(), HandlerError> + Send + Sync + 'static,
	{
		self.direct(filter, [ParamType::json::<T>()], move |mut args| {
			handler(args.take::<T>(0)?)
		})
	}

	/// Adds a pre-built descriptor target under `filter`.
	pub fn add(
		mut self,
		filter: &str,
		target: SubscriberTarget,
		parameter_types: impl IntoIterator<Item = ParamType>,
	) -> Result<Self, RegistryError> {
		let filter = TopicFilter::new(filter)?;
		for existing in &self.subscribers {
			if existing.filter() == &filter {
				return Err(RegistryError::DuplicateFilter {
					filter: filter.to_string(),
				});
			}
			if existing.filter().covers(&filter) {
				warn!(
					filter = %filter,
					shadowed_by = %existing.filter(),
					"Topic filter is covered by an earlier subscriber and will never receive messages"
				);
			}
		}
		debug!(
			filter = %filter,
			mode = ?target.execution_mode(),
			"Registered subscriber"
		);
		self.subscribers.push(Arc::new(SubscriberDescriptor::new(
			filter,
			target,
			parameter_types.into_iter().collect(),
		)));
		Ok(self)
	}

	pub fn build(self) -> SubscriberRegistry {
		SubscriberRegistry {
			subscribers: self.subscribers.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::topic::TopicFilterError;

	fn noop(_: Arguments) -> Result<(), HandlerError> {
		Ok(())
	}

	#[test]
	fn test_registration_order_is_preserved() {
		let registry = SubscriberRegistry::builder()
			.direct("a/+", [], noop)
			.unwrap()
			.direct("b/#", [ParamType::Text], noop)
			.unwrap()
			.build();

		let filters: Vec<_> =
			registry.iter().map(|s| s.filter().to_string()).collect();
		assert_eq!(filters, vec!["a/+", "b/#"]);
		assert_eq!(registry.len(), 2);
		assert!(!registry.has_deferred());
	}

	#[test]
	fn test_first_match_wins() {
		let registry = SubscriberRegistry::builder()
			.direct("a/+", [], noop)
			.unwrap()
			.direct("a/b", [ParamType::Topic], noop)
			.unwrap()
			.build();

		let topic = Topic::new("a/b").unwrap();
		let found = registry.find_first_match(&topic).unwrap();
		assert_eq!(found.filter().as_str(), "a/+");
		assert!(
			registry
				.find_first_match(&Topic::new("c").unwrap())
				.is_none()
		);
	}

	#[test]
	fn test_invalid_filter_rejected() {
		let err = SubscriberRegistry::builder()
			.direct("a/#/b", [], noop)
			.unwrap_err();
		assert_eq!(
			err,
			RegistryError::InvalidFilter(TopicFilterError::hash_position(
				"a/#/b"
			))
		);
	}

	#[test]
	fn test_duplicate_filter_rejected() {
		let err = SubscriberRegistry::builder()
			.direct("a/+", [], noop)
			.unwrap()
			.direct("a/+", [], noop)
			.unwrap_err();
		assert_eq!(err.error_type(), "duplicate_filter");
	}

	#[test]
	fn test_deferred_and_json_registration() {
		let registry = SubscriberRegistry::builder()
			.deferred("jobs/+", [ParamType::Bytes], |_args| async {
				Ok::<(), HandlerError>(())
			})
			.unwrap()
			.json::<serde_json::Value, _>("events/#", |_value| Ok(()))
			.unwrap()
			.build();

		assert!(registry.has_deferred());
		let modes: Vec<_> = registry.iter().map(|s| s.execution_mode()).collect();
		assert_eq!(modes, vec![ExecutionMode::Deferred, ExecutionMode::Direct]);
		assert_eq!(
			registry.iter().nth(1).unwrap().parameter_types(),
			&[ParamType::json::<serde_json::Value>()]
		);
	}
}
