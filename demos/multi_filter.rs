//! # Multiple Filters
//!
//! One subscription with two filters next to an unfiltered one, both
//! consumed as `futures::Stream`s. Closing the client ends both streams.

mod shared;

use std::time::Duration;

use futures::StreamExt;
use mqtt_stream_client::{MqttClient, SubscribeOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	shared::tracing::setup(None);

	let connection_url = shared::config::build_url("multi_filter");
	let client = MqttClient::connect(&connection_url)
		.await
		.inspect_err(|e| {
			shared::config::print_connection_error(&connection_url, e);
		})?;

	let filters = ["demo/sensors/+/temp", "demo/alerts/#"];
	let filtered = client.subscribe(filters).await?;
	// Receives everything this connection gets, including the messages of
	// the filtered subscription above.
	let everything = client
		.subscribe_with_options(
			"demo/status",
			SubscribeOptions::default().unfiltered(),
		)
		.await?;

	let filtered_task = tokio::spawn(async move {
		let mut stream = std::pin::pin!(filtered.into_stream());
		while let Some(item) = stream.next().await {
			match item {
				| Ok(message) => println!("[filtered]   {}", message.topic),
				| Err(e) => eprintln!("[filtered]   {e}"),
			}
		}
	});
	let everything_task = tokio::spawn(async move {
		let mut stream = std::pin::pin!(everything.into_stream());
		while let Some(item) = stream.next().await {
			match item {
				| Ok(message) => println!("[everything] {}", message.topic),
				| Err(e) => eprintln!("[everything] {e}"),
			}
		}
	});

	for topic in [
		"demo/sensors/kitchen/temp",
		"demo/sensors/kitchen/humidity",
		"demo/alerts/fire",
		"demo/alerts",
		"demo/status",
	] {
		client.publish(topic, "payload").await?;
	}
	tokio::time::sleep(Duration::from_secs(1)).await;

	// Ends both streams; each subscription releases itself.
	client.close(false).await;
	filtered_task.await?;
	everything_task.await?;
	Ok(())
}
