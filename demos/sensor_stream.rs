//! # Sensor Stream
//!
//! Subscribes to `sensors/+/temp`, publishes a few readings from a second
//! task and reads them back as a message stream.

mod shared;

use std::time::Duration;

use mqtt_stream_client::{MqttClient, PublishOptions, QoS};

const READINGS: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	shared::tracing::setup(None);

	let connection_url = shared::config::build_url("sensor_stream");
	println!("Connecting to MQTT broker: {connection_url}");

	let client = MqttClient::connect(&connection_url)
		.await
		.inspect_err(|e| {
			shared::config::print_connection_error(&connection_url, e);
		})?;
	println!("Connected to MQTT broker");

	// Returns once the broker acknowledged the subscription, so nothing
	// published afterwards is missed.
	let mut readings = client.subscribe("sensors/+/temp").await?;
	println!("Subscribed to: sensors/+/temp");

	let publisher = client.clone();
	let producer = tokio::spawn(async move {
		let options = PublishOptions::default().with_qos(QoS::AtLeastOnce);
		for i in 0..READINGS {
			let topic = format!("sensors/room{}/temp", i % 2);
			let value = format!("{:.1}", 20.0 + i as f64 * 0.5);
			match publisher.publish_with_options(&topic, value, options).await {
				| Ok(ack) => println!("Published to {topic} (packet {})", ack.pkid()),
				| Err(e) => eprintln!("Publish failed: {e}"),
			}
			tokio::time::sleep(Duration::from_millis(100)).await;
		}
	});

	let mut received = 0;
	while received < READINGS {
		match tokio::time::timeout(Duration::from_secs(5), readings.next()).await {
			| Ok(Some(Ok(message))) => {
				received += 1;
				println!(
					"[{received}/{READINGS}] {} = {}",
					message.topic,
					message.payload_str().unwrap_or("<binary>")
				);
			}
			| Ok(Some(Err(e))) => {
				eprintln!("Subscription failed: {e}");
				break;
			}
			| Ok(None) => break,
			| Err(_) => {
				eprintln!("No reading within 5 seconds");
				break;
			}
		}
	}

	producer.await?;
	readings.close().await?;
	client.close(false).await;
	println!("Disconnected");
	Ok(())
}
