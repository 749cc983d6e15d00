//! Incoming publish representation handed to the dispatcher.

use bytes::Bytes;
use rumqttc::QoS;

use crate::topic::{Topic, TopicError};

/// A publish already received from the broker, read-only during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMessage {
	/// Concrete topic the message was published on
	pub topic: Topic,
	/// Raw payload bytes
	pub payload: Bytes,
	/// Delivery quality of service
	pub qos: QoS,
	/// Whether the broker delivered this as a retained message
	pub retained: bool,
}

impl PublishMessage {
	/// Creates a message with `AtMostOnce` QoS and no retain flag.
	pub fn new(topic: Topic, payload: impl Into<Bytes>) -> Self {
		Self {
			topic,
			payload: payload.into(),
			qos: QoS::AtMostOnce,
			retained: false,
		}
	}

	/// Validates `topic` and creates a message from it.
	pub fn try_new(
		topic: &str,
		payload: impl Into<Bytes>,
	) -> Result<Self, TopicError> {
		Ok(Self::new(Topic::new(topic)?, payload))
	}

	pub fn with_qos(mut self, qos: QoS) -> Self {
		self.qos = qos;
		self
	}

	pub fn with_retained(mut self, retained: bool) -> Self {
		self.retained = retained;
		self
	}

	pub fn payload_len(&self) -> usize {
		self.payload.len()
	}
}

impl TryFrom<rumqttc::Publish> for PublishMessage {
	type Error = TopicError;

	fn try_from(publish: rumqttc::Publish) -> Result<Self, Self::Error> {
		Ok(Self {
			topic: Topic::new(publish.topic)?,
			payload: publish.payload,
			qos: publish.qos,
			retained: publish.retain,
		})
	}
}
