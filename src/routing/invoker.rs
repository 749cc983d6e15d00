//! Invocation engine: turns a subscriber descriptor into a callable
//! [`Invoker`] and memoizes it per filter.
//!
//! Both execution modes present the same blocking contract to the
//! dispatcher: `invoke` returns only once the handler has completed or
//! failed. Direct handlers run on the calling thread. Deferred handlers are
//! spawned on a dedicated tokio runtime and the calling thread waits for the
//! task, optionally bounded by a timeout.

use std::future::Future;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, warn};

use super::error::{DispatchFailure, HandlerError};
use super::subscriber::{
	DeferredHandlerFn, DirectHandlerFn, ExecutionMode, SubscriberDescriptor,
	SubscriberTarget,
};
use crate::message_adapter::Arguments;
use crate::topic::TopicFilter;

/// Dedicated pool on which deferred handlers run.
pub struct DeferredExecutor {
	handle: Handle,
	// Taken only by `Drop`
	runtime: Option<Runtime>,
	timeout: Option<Duration>,
}

impl DeferredExecutor {
	/// Starts a multi-threaded pool with `workers` threads.
	///
	/// `timeout` bounds how long a dispatching thread waits for one handler;
	/// `None` waits indefinitely.
	pub fn new(workers: usize, timeout: Option<Duration>) -> io::Result<Self> {
		let runtime = Builder::new_multi_thread()
			.worker_threads(workers.max(1))
			.thread_name("mqtt-deferred")
			.enable_time()
			.build()?;
		debug!(workers = workers.max(1), timeout = ?timeout, "Started deferred execution pool");
		Ok(Self {
			handle: runtime.handle().clone(),
			runtime: Some(runtime),
			timeout,
		})
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	/// Runs `future` on the pool and blocks the calling thread until it
	/// completes, fails or exceeds the wait policy.
	///
	/// On timeout the handler future is dropped at its next suspension
	/// point, so a timed out handler does not keep running on the pool.
	/// Must not be called from one of the pool's own worker threads.
	pub fn run_blocking<F>(&self, future: F) -> Result<(), DispatchFailure>
	where F: Future<Output = Result<(), HandlerError>> + Send + 'static {
		let timeout = self.timeout;
		let task = self.handle.spawn(async move {
			match timeout {
				| Some(limit) => tokio::time::timeout(limit, future)
					.await
					.map_err(|_| DispatchFailure::DeferredTimeout {
						timeout: limit,
					})?
					.map_err(DispatchFailure::Handler),
				| None => future.await.map_err(DispatchFailure::Handler),
			}
		});

		match futures::executor::block_on(task) {
			| Ok(result) => result,
			| Err(err) if err.is_panic() => {
				Err(DispatchFailure::panic(err.into_panic()))
			}
			| Err(err) => Err(DispatchFailure::DeferredTask(err)),
		}
	}
}

impl Drop for DeferredExecutor {
	fn drop(&mut self) {
		// Dropping a runtime from async context panics, background shutdown
		// does not.
		if let Some(runtime) = self.runtime.take() {
			runtime.shutdown_background();
		}
	}
}

/// Ready-to-call handler built once per filter.
pub enum Invoker {
	Direct(Arc<DirectHandlerFn>),
	Deferred {
		handler: Arc<DeferredHandlerFn>,
		executor: Arc<DeferredExecutor>,
	},
}

impl Invoker {
	/// Binds the descriptor's target to its execution mode.
	pub fn build(
		descriptor: &SubscriberDescriptor,
		executor: Option<&Arc<DeferredExecutor>>,
	) -> Result<Self, DispatchFailure> {
		match descriptor.target() {
			| SubscriberTarget::Direct(handler) => {
				Ok(Invoker::Direct(Arc::clone(handler)))
			}
			| SubscriberTarget::Deferred(handler) => {
				let executor = executor.ok_or_else(|| {
					DispatchFailure::DeferredPoolUnavailable {
						filter: descriptor.filter().to_string(),
					}
				})?;
				Ok(Invoker::Deferred {
					handler: Arc::clone(handler),
					executor: Arc::clone(executor),
				})
			}
		}
	}

	pub fn execution_mode(&self) -> ExecutionMode {
		match self {
			| Invoker::Direct(_) => ExecutionMode::Direct,
			| Invoker::Deferred { .. } => ExecutionMode::Deferred,
		}
	}

	/// Calls the handler with adapted arguments and waits for completion.
	///
	/// Handler errors and panics come back as [`DispatchFailure`].
	pub fn invoke(&self, args: Arguments) -> Result<(), DispatchFailure> {
		match self {
			| Invoker::Direct(handler) => {
				match panic::catch_unwind(AssertUnwindSafe(|| handler(args))) {
					| Ok(result) => result.map_err(DispatchFailure::Handler),
					| Err(payload) => Err(DispatchFailure::panic(payload)),
				}
			}
			| Invoker::Deferred { handler, executor } => {
				let handler = Arc::clone(handler);
				executor.run_blocking(async move { handler(args).await })
			}
		}
	}
}

impl std::fmt::Debug for Invoker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Invoker::{:?}", self.execution_mode())
	}
}

/// Per-filter memo of invokers.
///
/// Never holds more entries than there are distinct filters. Construction
/// happens under the map's entry lock, so concurrent first access for one
/// filter observes a single shared invoker.
pub struct InvocationCache {
	invokers: DashMap<TopicFilter, Arc<Invoker>>,
	executor: Option<Arc<DeferredExecutor>>,
}

impl InvocationCache {
	pub fn new(
		expected_filters: usize,
		executor: Option<Arc<DeferredExecutor>>,
	) -> Self {
		Self {
			invokers: DashMap::with_capacity(expected_filters),
			executor,
		}
	}

	/// Returns the invoker for the descriptor's filter, building it on first
	/// use.
	pub fn invoker_for(
		&self,
		descriptor: &SubscriberDescriptor,
	) -> Result<Arc<Invoker>, DispatchFailure> {
		if let Some(invoker) = self.invokers.get(descriptor.filter()) {
			return Ok(Arc::clone(invoker.value()));
		}

		match self.invokers.entry(descriptor.filter().clone()) {
			| Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
			| Entry::Vacant(entry) => {
				let invoker = Invoker::build(descriptor, self.executor.as_ref())
					.inspect_err(|err| {
						warn!(
							filter = %descriptor.filter(),
							error = %err,
							"Failed to build invoker"
						);
					})?;
				debug!(
					filter = %descriptor.filter(),
					mode = ?invoker.execution_mode(),
					"Built invoker"
				);
				Ok(Arc::clone(entry.insert(Arc::new(invoker)).value()))
			}
		}
	}

	pub fn len(&self) -> usize {
		self.invokers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.invokers.is_empty()
	}

	pub fn executor(&self) -> Option<&Arc<DeferredExecutor>> {
		self.executor.as_ref()
	}
}
