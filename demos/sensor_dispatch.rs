//! # Sensor Dispatch
//!
//! Feeds a burst of publishes, as a transport would hand them over, through
//! a fully decorated dispatcher:
//! - JSON readings routed by wildcard filter to a direct handler
//! - Firmware uploads handled by an async handler on the deferred pool
//! - Malformed payloads and unknown topics reported to the error handler
//! - Unexpected disconnects counted, user-requested ones ignored
//! - Message and error counters exported in Prometheus text format
//!
//! ```bash
//! RUST_LOG=mqtt_typed_dispatch=debug cargo run --example sensor_dispatch
//! ```

mod shared;

use std::time::Duration;

use mqtt_typed_dispatch::advanced::LoggingDisconnectListener;
use mqtt_typed_dispatch::observability::{
	DisconnectCountingListener, ErrorCountingErrorHandler,
	MessageCountingHandler, TracingHandler,
};
use mqtt_typed_dispatch::{DisconnectListener, DisconnectSource};
use mqtt_typed_dispatch::prelude::*;
use mqtt_typed_dispatch::routing::LoggingErrorHandler;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct Reading {
	v: f64,
	#[serde(default)]
	unit: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	shared::tracing::setup(Some("mqtt_typed_dispatch=debug,sensor_dispatch=info"));

	let subscribers = SubscriberRegistry::builder()
		.direct(
			"sensors/+/temp",
			[ParamType::json::<Reading>(), ParamType::Topic],
			|mut args| {
				let reading = args.take::<Reading>(0)?;
				let topic = args.take::<Topic>(1)?;
				let unit = reading.unit.as_deref().unwrap_or("C");
				println!("🌡️  {topic}: {} {unit}", reading.v);
				Ok(())
			},
		)?
		.deferred(
			"firmware/#",
			[ParamType::Topic, ParamType::Bytes],
			|mut args| async move {
				let topic = args.take::<Topic>(0)?;
				let image = args.take::<bytes::Bytes>(1)?;
				tokio::time::sleep(Duration::from_millis(50)).await;
				println!("📦 {topic}: stored {} byte image", image.len());
				Ok::<(), HandlerError>(())
			},
		)?
		// Never reached: sensors/+/temp above already takes these topics
		.direct("sensors/1/temp", [], |_| Ok(()))?
		.build();

	let metrics = Registry::new();
	let error_handler =
		ErrorCountingErrorHandler::new(LoggingErrorHandler, &metrics)?;
	let dispatcher = Dispatcher::builder(subscribers)
		.with_config(
			DispatcherConfig::new()
				.with_deferred_workers(2)
				.with_deferred_timeout(Duration::from_secs(2)),
		)
		.with_error_handler(error_handler)
		.build()?;
	let handler =
		TracingHandler::new(MessageCountingHandler::new(dispatcher, &metrics)?);

	let feed = [
		("sensors/1/temp", r#"{"v":21.5}"#),
		("sensors/2/temp", r#"{"v":70.1,"unit":"F"}"#),
		("firmware/gateway/v2", "\u{7f}ELF..."),
		("sensors/3/temp", r#"{"v":"warm"}"#),
		("sensors/4/temp", "{"),
		("sensors/1/humidity", r#"{"v":40}"#),
	];
	for (topic, payload) in feed {
		let publish = rumqttc::Publish::new(topic, QoS::AtLeastOnce, payload);
		handler.handle(&PublishMessage::try_from(publish)?);
	}

	// A connector reports how its connection ended; only the broker drop counts
	let disconnects =
		DisconnectCountingListener::new(LoggingDisconnectListener, &metrics)?;
	disconnects.on_disconnect(DisconnectSource::Server);
	disconnects.on_disconnect(DisconnectSource::User);

	let mut buffer = Vec::new();
	TextEncoder::new().encode(&metrics.gather(), &mut buffer)?;
	println!("\n{}", String::from_utf8(buffer)?);
	Ok(())
}
