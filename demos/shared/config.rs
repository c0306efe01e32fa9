use std::env;

use uuid::Uuid;

/// MQTT broker URL from `MQTT_BROKER`, `.env` files, or the local default.
pub fn broker_url() -> String {
	dotenv::dotenv().ok();
	if std::path::Path::new("demos/.env.local").exists() {
		dotenv::from_filename("demos/.env.local").ok();
	}

	env::var("MQTT_BROKER")
		.unwrap_or_else(|_| "mqtt://localhost:1883".to_string())
}

/// Client id made of `prefix` and a short random suffix, e.g.
/// `sensor_stream_a1b2c3d4`.
pub fn get_client_id(prefix: &str) -> String {
	let uuid = Uuid::new_v4().to_string();
	format!("{prefix}_{}", &uuid[..8])
}

/// Broker URL with a unique `client_id` query parameter.
pub fn build_url(client_id_prefix: &str) -> String {
	let base_url = broker_url();
	let client_id = get_client_id(client_id_prefix);

	if base_url.contains('?') {
		format!("{base_url}&client_id={client_id}")
	} else {
		format!("{base_url}?client_id={client_id}")
	}
}

/// Explains the most common reasons a demo cannot connect.
pub fn print_connection_error(url: &str, error: &dyn std::error::Error) {
	eprintln!("Failed to connect to {url}: {error}");
	eprintln!();
	eprintln!("Start a local broker, for example:");
	eprintln!("  docker run -p 1883:1883 eclipse-mosquitto:2 mosquitto -c /mosquitto-no-auth.conf");
	eprintln!("or point MQTT_BROKER at another one (demos/.env.local).");
}
