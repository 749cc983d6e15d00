//! Connection lifecycle boundary.
//!
//! The broker connection itself lives outside this crate. [`MqttConnector`]
//! only describes its lifecycle so that decorators can wrap it, and
//! [`DisconnectListener`] is how a connector reports lost connections.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

/// Errors reported by a connector while starting.
#[derive(Error, Debug)]
pub enum ConnectorError {
	#[error("Connection failed: {0}")]
	Connection(#[source] Box<dyn std::error::Error + Send + Sync>),
	#[error("Connector is already running")]
	AlreadyRunning,
	#[error("Connector configuration invalid: {0}")]
	Configuration(String),
}

impl ConnectorError {
	pub fn connection(
		source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
	) -> Self {
		ConnectorError::Connection(source.into())
	}

	pub fn error_type(&self) -> &'static str {
		match self {
			| ConnectorError::Connection(_) => "connection",
			| ConnectorError::AlreadyRunning => "already_running",
			| ConnectorError::Configuration(_) => "configuration",
		}
	}
}

/// Lifecycle of the component that connects to the broker and feeds
/// received messages into an [`MqttHandler`](crate::MqttHandler).
pub trait MqttConnector: Send + Sync {
	fn start(&self) -> Result<(), ConnectorError>;

	fn stop(&self);

	fn is_running(&self) -> bool;
}

impl<C: MqttConnector + ?Sized> MqttConnector for Arc<C> {
	fn start(&self) -> Result<(), ConnectorError> {
		(**self).start()
	}

	fn stop(&self) {
		(**self).stop()
	}

	fn is_running(&self) -> bool {
		(**self).is_running()
	}
}

impl<C: MqttConnector + ?Sized> MqttConnector for Box<C> {
	fn start(&self) -> Result<(), ConnectorError> {
		(**self).start()
	}

	fn stop(&self) {
		(**self).stop()
	}

	fn is_running(&self) -> bool {
		(**self).is_running()
	}
}

/// Who ended a broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectSource {
	/// The application asked for it, e.g. through [`MqttConnector::stop`]
	User,
	/// The client side gave up, e.g. on a keep-alive or I/O failure
	Client,
	/// The broker closed the connection
	Server,
}

impl DisconnectSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			| DisconnectSource::User => "user",
			| DisconnectSource::Client => "client",
			| DisconnectSource::Server => "server",
		}
	}

	/// True for disconnects the application did not ask for.
	pub fn is_unexpected(&self) -> bool {
		!matches!(self, DisconnectSource::User)
	}
}

/// Notified by a connector each time its broker connection ends.
pub trait DisconnectListener: Send + Sync {
	fn on_disconnect(&self, source: DisconnectSource);
}

impl<L: DisconnectListener + ?Sized> DisconnectListener for Arc<L> {
	fn on_disconnect(&self, source: DisconnectSource) {
		(**self).on_disconnect(source)
	}
}

impl<L: DisconnectListener + ?Sized> DisconnectListener for Box<L> {
	fn on_disconnect(&self, source: DisconnectSource) {
		(**self).on_disconnect(source)
	}
}

/// Default listener, logs unexpected disconnects as warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDisconnectListener;

impl DisconnectListener for LoggingDisconnectListener {
	fn on_disconnect(&self, source: DisconnectSource) {
		if source.is_unexpected() {
			warn!(source = source.as_str(), "Mqtt connection lost");
		} else {
			info!(source = source.as_str(), "Mqtt connection closed");
		}
	}
}

/// Adapts a closure into a disconnect listener.
pub struct FnDisconnectListener<F>(pub F);

impl<F> DisconnectListener for FnDisconnectListener<F>
where F: Fn(DisconnectSource) + Send + Sync
{
	fn on_disconnect(&self, source: DisconnectSource) {
		(self.0)(source)
	}
}
