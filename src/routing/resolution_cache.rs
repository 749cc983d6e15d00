use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::error::DispatchFailure;
use super::subscriber::{SubscriberDescriptor, SubscriberRegistry};
use crate::topic::Topic;

/// Bounded LRU cache from concrete topic to the subscriber that handles it.
///
/// A subscriber registered for `foo/+` that has received messages on
/// `foo/bar` and `foo/baz` is reachable through two entries, one per topic.
/// On a miss the registry is scanned in registration order and the first
/// matching filter wins. The scan runs outside the lock, so concurrent
/// misses on the same topic may both scan; they always agree because the
/// registry never changes.
///
/// A capacity of zero disables caching entirely. The capacity is only an
/// upper bound; entries are allocated as topics arrive.
pub struct TopicResolutionCache {
	registry: SubscriberRegistry,
	cache: Option<Mutex<LruCache<Topic, Arc<SubscriberDescriptor>>>>,
}

impl TopicResolutionCache {
	pub fn new(registry: SubscriberRegistry, capacity: usize) -> Self {
		let cache = NonZeroUsize::new(capacity).map(|capacity| {
			let mut cache = LruCache::unbounded();
			cache.resize(capacity);
			Mutex::new(cache)
		});
		Self { registry, cache }
	}

	/// Resolves `topic` to its subscriber, scanning the registry on a miss.
	pub fn resolve(
		&self,
		topic: &Topic,
	) -> Result<Arc<SubscriberDescriptor>, DispatchFailure> {
		if let Some(cache) = &self.cache {
			if let Some(descriptor) = cache.lock().get(topic) {
				return Ok(Arc::clone(descriptor));
			}
		}

		let descriptor = self
			.registry
			.find_first_match(topic)
			.map(Arc::clone)
			.ok_or_else(|| DispatchFailure::no_match(topic))?;
		debug!(
			topic = %topic,
			filter = %descriptor.filter(),
			"Resolved topic by scanning subscribers"
		);

		if let Some(cache) = &self.cache {
			cache.lock().put(topic.clone(), Arc::clone(&descriptor));
		}
		Ok(descriptor)
	}

	/// Returns true if `topic` is cached, without touching its recency.
	pub fn contains(&self, topic: &Topic) -> bool {
		self.cache
			.as_ref()
			.is_some_and(|cache| cache.lock().contains(topic))
	}

	pub fn len(&self) -> usize {
		self.cache.as_ref().map_or(0, |cache| cache.lock().len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn capacity(&self) -> usize {
		self.cache
			.as_ref()
			.map_or(0, |cache| cache.lock().cap().get())
	}

	pub fn clear(&self) {
		if let Some(cache) = &self.cache {
			cache.lock().clear();
		}
	}

	pub fn registry(&self) -> &SubscriberRegistry {
		&self.registry
	}
}
