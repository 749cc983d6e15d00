//! Configuration for dispatcher construction

use std::time::Duration;

use serde::Deserialize;

/// Multiplier applied to the subscriber count when no explicit topic cache
/// size is configured
pub const DEFAULT_TOPIC_CACHE_FACTOR: usize = 10;

/// Default number of worker threads in the deferred execution pool
pub const DEFAULT_DEFERRED_WORKERS: usize = 2;

/// Dispatcher performance and behavior settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
	/// Capacity of the topic resolution cache.
	///
	/// `None` sizes the cache at ten entries per subscriber. Zero or a
	/// negative value disables the cache, so every message scans the
	/// registry.
	pub topic_cache_size: Option<i64>,
	/// Worker threads of the pool running deferred handlers
	pub deferred_workers: usize,
	/// Upper bound on how long a dispatching thread waits for a deferred
	/// handler. `None` waits indefinitely: a stuck handler then blocks its
	/// dispatching thread forever.
	#[serde(with = "optional_millis")]
	pub deferred_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
	fn default() -> Self {
		Self {
			topic_cache_size: None,
			deferred_workers: DEFAULT_DEFERRED_WORKERS,
			deferred_timeout: None,
		}
	}
}

impl DispatcherConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the topic resolution cache capacity
	pub fn with_topic_cache_size(self, size: i64) -> Self {
		Self {
			topic_cache_size: Some(size),
			..self
		}
	}

	/// Set the deferred pool size
	pub fn with_deferred_workers(self, workers: usize) -> Self {
		Self {
			deferred_workers: workers,
			..self
		}
	}

	/// Bound the wait for deferred handlers
	pub fn with_deferred_timeout(self, timeout: Duration) -> Self {
		Self {
			deferred_timeout: Some(timeout),
			..self
		}
	}

	/// Resolves the cache capacity for a registry of `subscribers` entries.
	pub fn effective_topic_cache_size(&self, subscribers: usize) -> usize {
		match self.topic_cache_size {
			| None => subscribers.saturating_mul(DEFAULT_TOPIC_CACHE_FACTOR),
			| Some(size) => usize::try_from(size.max(0)).unwrap_or(usize::MAX),
		}
	}
}

/// Serde helper reading `Option<Duration>` as whole milliseconds.
mod optional_millis {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer};

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
	where D: Deserializer<'de> {
		Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
	}
}
