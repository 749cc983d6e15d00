//! # Dispatch Metrics
//!
//! Prometheus decorators for the dispatcher, the error handler and the
//! connector.
//!
//! ## Usage
//!
//! Enabled by the default `metrics` feature. Every decorator registers its
//! collectors on a caller-supplied [`Registry`], so several dispatchers can
//! export into separate registries.
//!
//! ## Metrics Exported
//!
//! - `mqtt_messages_count` - Counter of messages handed to the dispatcher
//! - `mqtt_messages_bytes_count` - Counter of payload bytes handed to the dispatcher
//! - `mqtt_errors_count` - Counter of dispatch failures (by kind)
//! - `mqtt_connect_time_seconds` - Histogram of connector start durations
//! - `mqtt_disconnect_count` - Counter of disconnects the application did not request

use prometheus::{
	Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};
use tracing::debug;

use crate::connector::{
	ConnectorError, DisconnectListener, DisconnectSource, MqttConnector,
};
use crate::message::PublishMessage;
use crate::routing::{MqttHandler, MqttMessageError, MqttMessageErrorHandler};

/// Counts messages and payload bytes, then dispatches.
pub struct MessageCountingHandler<H> {
	inner: H,
	messages: IntCounter,
	bytes: IntCounter,
}

impl<H: MqttHandler> MessageCountingHandler<H> {
	pub fn new(inner: H, registry: &Registry) -> prometheus::Result<Self> {
		let messages = IntCounter::new(
			"mqtt_messages_count",
			"Total number of mqtt messages received",
		)?;
		let bytes = IntCounter::new(
			"mqtt_messages_bytes_count",
			"Total payload bytes of mqtt messages received",
		)?;
		registry.register(Box::new(messages.clone()))?;
		registry.register(Box::new(bytes.clone()))?;
		Ok(Self {
			inner,
			messages,
			bytes,
		})
	}

	pub fn messages(&self) -> &IntCounter {
		&self.messages
	}

	pub fn bytes(&self) -> &IntCounter {
		&self.bytes
	}

	pub fn inner(&self) -> &H {
		&self.inner
	}
}

impl<H: MqttHandler> MqttHandler for MessageCountingHandler<H> {
	fn handle(&self, message: &PublishMessage) {
		self.messages.inc();
		self.bytes.inc_by(message.payload_len() as u64);
		self.inner.handle(message)
	}
}

/// Counts failures by kind, then forwards them.
pub struct ErrorCountingErrorHandler<E> {
	inner: E,
	errors: IntCounterVec,
}

impl<E: MqttMessageErrorHandler> ErrorCountingErrorHandler<E> {
	pub fn new(inner: E, registry: &Registry) -> prometheus::Result<Self> {
		let errors = IntCounterVec::new(
			Opts::new(
				"mqtt_errors_count",
				"Total number of mqtt messages that failed to dispatch",
			),
			&["kind"],
		)?;
		registry.register(Box::new(errors.clone()))?;
		Ok(Self { inner, errors })
	}

	pub fn errors(&self) -> &IntCounterVec {
		&self.errors
	}

	pub fn inner(&self) -> &E {
		&self.inner
	}
}

impl<E: MqttMessageErrorHandler> MqttMessageErrorHandler
	for ErrorCountingErrorHandler<E>
{
	fn handle(&self, error: MqttMessageError) {
		match self
			.errors
			.get_metric_with_label_values(&[error.kind().as_str()])
		{
			| Ok(counter) => counter.inc(),
			| Err(err) => {
				debug!(error = %err, "Failed to record mqtt error metric")
			}
		}
		self.inner.handle(error)
	}
}

/// Measures how long the wrapped connector takes to start.
pub struct TimedConnector<C> {
	inner: C,
	connect_time: Histogram,
}

impl<C: MqttConnector> TimedConnector<C> {
	pub fn new(inner: C, registry: &Registry) -> prometheus::Result<Self> {
		let connect_time = Histogram::with_opts(HistogramOpts::new(
			"mqtt_connect_time_seconds",
			"Time taken to start the mqtt connection in seconds",
		))?;
		registry.register(Box::new(connect_time.clone()))?;
		Ok(Self {
			inner,
			connect_time,
		})
	}

	pub fn connect_time(&self) -> &Histogram {
		&self.connect_time
	}

	pub fn inner(&self) -> &C {
		&self.inner
	}
}

impl<C: MqttConnector> MqttConnector for TimedConnector<C> {
	fn start(&self) -> Result<(), ConnectorError> {
		let timer = self.connect_time.start_timer();
		let result = self.inner.start();
		timer.observe_duration();
		result
	}

	fn stop(&self) {
		self.inner.stop()
	}

	fn is_running(&self) -> bool {
		self.inner.is_running()
	}
}

/// Counts disconnects not initiated by the application, then forwards
/// every disconnect.
pub struct DisconnectCountingListener<L> {
	inner: L,
	disconnects: IntCounter,
}

impl<L: DisconnectListener> DisconnectCountingListener<L> {
	pub fn new(inner: L, registry: &Registry) -> prometheus::Result<Self> {
		let disconnects = IntCounter::new(
			"mqtt_disconnect_count",
			"Total number of mqtt disconnects not requested by the application",
		)?;
		registry.register(Box::new(disconnects.clone()))?;
		Ok(Self { inner, disconnects })
	}

	pub fn disconnects(&self) -> &IntCounter {
		&self.disconnects
	}

	pub fn inner(&self) -> &L {
		&self.inner
	}
}

impl<L: DisconnectListener> DisconnectListener for DisconnectCountingListener<L> {
	fn on_disconnect(&self, source: DisconnectSource) {
		if source.is_unexpected() {
			self.disconnects.inc();
		}
		self.inner.on_disconnect(source)
	}
}
