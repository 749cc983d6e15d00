use std::sync::Arc;

use tracing::error;

use super::error::MqttMessageError;

/// Receives every classified dispatch failure.
///
/// Called at most once per message, on the dispatching thread.
/// Implementations must not panic.
pub trait MqttMessageErrorHandler: Send + Sync {
	fn handle(&self, error: MqttMessageError);
}

impl<E: MqttMessageErrorHandler + ?Sized> MqttMessageErrorHandler for Arc<E> {
	fn handle(&self, error: MqttMessageError) {
		(**self).handle(error)
	}
}

impl<E: MqttMessageErrorHandler + ?Sized> MqttMessageErrorHandler for Box<E> {
	fn handle(&self, error: MqttMessageError) {
		(**self).handle(error)
	}
}

/// Default error handler, writes one structured log entry per failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingErrorHandler;

impl MqttMessageErrorHandler for LoggingErrorHandler {
	fn handle(&self, err: MqttMessageError) {
		error!(
			topic = %err.topic(),
			kind = %err.kind(),
			error_type = err.cause().error_type(),
			payload_size = err.payload().len(),
			cause = %err.cause(),
			"{}",
			err.message()
		);
	}
}

/// Adapts a closure into an error handler.
pub struct FnErrorHandler<F>(pub F);

impl<F> MqttMessageErrorHandler for FnErrorHandler<F>
where F: Fn(MqttMessageError) + Send + Sync
{
	fn handle(&self, error: MqttMessageError) {
		(self.0)(error)
	}
}
