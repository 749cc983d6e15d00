use tracing::info_span;

use crate::message::PublishMessage;
use crate::routing::MqttHandler;

/// Runs the wrapped handler inside an `mqtt.handle` span.
pub struct TracingHandler<H> {
	inner: H,
}

impl<H: MqttHandler> TracingHandler<H> {
	pub fn new(inner: H) -> Self {
		Self { inner }
	}

	pub fn inner(&self) -> &H {
		&self.inner
	}

	pub fn into_inner(self) -> H {
		self.inner
	}
}

impl<H: MqttHandler> MqttHandler for TracingHandler<H> {
	fn handle(&self, message: &PublishMessage) {
		let span = info_span!(
			"mqtt.handle",
			topic = %message.topic,
			qos = ?message.qos,
			retained = message.retained,
			payload_size = message.payload_len()
		);
		let _entered = span.enter();
		self.inner.handle(message)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;

	use super::*;

	struct SpanRecorder(Mutex<Vec<Option<&'static str>>>);

	impl MqttHandler for SpanRecorder {
		fn handle(&self, _message: &PublishMessage) {
			let current = tracing::Span::current();
			self.0.lock().push(current.metadata().map(|m| m.name()));
		}
	}

	#[test]
	fn test_delegates_inside_span() {
		let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
		let recorder = Arc::new(SpanRecorder(Mutex::new(Vec::new())));
		let handler = TracingHandler::new(Arc::clone(&recorder));

		tracing::subscriber::with_default(subscriber, || {
			handler.handle(&PublishMessage::try_new("a/b", "x").unwrap());
		});

		assert_eq!(*recorder.0.lock(), vec![Some("mqtt.handle")]);
	}
}
