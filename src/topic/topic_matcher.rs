//! MQTT topic filter matching over pre-split topic segments.

/// Multi-level wildcard segment.
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Single-level wildcard segment.
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Checks whether a topic matches a subscription filter.
///
/// Both sides are the `/`-separated segments of their strings. A `+`
/// segment matches exactly one topic segment, a `#` segment matches the
/// remaining topic segments (including none). Everything else must be equal
/// byte for byte; empty segments are compared like any other.
///
/// ```rust
/// use mqtt_stream_client::topic::matches;
///
/// assert!(matches(&["sensors", "+", "temp"], &["sensors", "room1", "temp"]));
/// assert!(matches(&["sensors", "#"], &["sensors"]));
/// assert!(!matches(&["sensors", "+"], &["sensors"]));
/// ```
pub fn matches<F, T>(filter: &[F], topic: &[T]) -> bool
where
	F: AsRef<str>,
	T: AsRef<str>,
{
	for (position, segment) in filter.iter().enumerate() {
		let segment = segment.as_ref();
		if segment == MULTI_LEVEL_WILDCARD {
			return true;
		}
		let Some(topic_segment) = topic.get(position) else {
			return false;
		};
		if segment != SINGLE_LEVEL_WILDCARD && segment != topic_segment.as_ref()
		{
			return false;
		}
	}
	filter.len() == topic.len()
}
