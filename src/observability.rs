//! Optional decorators that observe dispatch without changing it.
//!
//! Every decorator implements the same trait as the component it wraps and
//! delegates unconditionally, so they stack in any order:
//!
//! ```rust,ignore
//! let handler = TracingHandler::new(MessageCountingHandler::new(
//!     dispatcher,
//!     &registry,
//! )?);
//! ```

#[cfg(feature = "metrics")]
pub mod metrics;
pub mod tracing_handler;

#[cfg(feature = "metrics")]
pub use metrics::{
	DisconnectCountingListener, ErrorCountingErrorHandler,
	MessageCountingHandler, TimedConnector,
};
pub use tracing_handler::TracingHandler;
