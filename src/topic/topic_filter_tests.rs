//! Tests for TopicFilter parsing and matching

use super::{TopicFilter, TopicFilterError, TopicFilters, validation};

#[test]
fn test_segments_are_split_on_slash() {
	let filter = TopicFilter::new("sensors/+/temp").unwrap();

	assert_eq!(filter.as_str(), "sensors/+/temp");
	let segments: Vec<&str> =
		filter.segments().iter().map(|s| s.as_str()).collect();
	assert_eq!(segments, vec!["sensors", "+", "temp"]);
	assert!(filter.has_wildcards());
	assert_eq!(filter.to_string(), "sensors/+/temp");
}

#[test]
fn test_concrete_filter_has_no_wildcards() {
	let filter = TopicFilter::new("a/b/c").unwrap();
	assert!(!filter.has_wildcards());
	assert!(filter.matches("a/b/c"));
	assert!(!filter.matches("a/b"));
}

#[test]
fn test_filter_matches_received_topics() {
	let filter = TopicFilter::new("sensors/+/temp").unwrap();
	assert!(filter.matches("sensors/room1/temp"));
	assert!(!filter.matches("sensors/room1/humidity"));
	assert!(!filter.matches("alerts/fire"));

	let everything = TopicFilter::new("#").unwrap();
	assert!(everything.matches("alerts/fire"));
	assert!(everything.matches("x"));
}

#[test]
fn test_empty_filter_rejected() {
	assert_eq!(TopicFilter::new(""), Err(TopicFilterError::EmptyTopic));
}

#[test]
fn test_hash_must_be_last() {
	let err = TopicFilter::new("a/#/b").unwrap_err();
	assert!(matches!(err, TopicFilterError::InvalidWildcard { .. }));
}

#[test]
fn test_wildcards_must_fill_a_level() {
	for pattern in ["a/b#", "a/+b", "a+/c", "#a"] {
		let err = TopicFilter::new(pattern).unwrap_err();
		assert!(
			matches!(err, TopicFilterError::InvalidWildcard { .. }),
			"pattern {pattern} should be rejected, got {err:?}"
		);
	}
}

#[test]
fn test_null_character_rejected() {
	let err = TopicFilter::new("a/\0/b").unwrap_err();
	assert!(matches!(err, TopicFilterError::NullCharacter { .. }));
}

#[test]
fn test_too_long_rejected() {
	let pattern = "a".repeat(super::limits::MAX_TOPIC_LENGTH + 1);
	let err = TopicFilter::new(pattern).unwrap_err();
	assert!(matches!(err, TopicFilterError::TooLong { .. }));
}

#[test]
fn test_try_from_strings() {
	let from_str = TopicFilter::try_from("a/+").unwrap();
	let from_string = TopicFilter::try_from(String::from("a/+")).unwrap();
	assert_eq!(from_str, from_string);
}

#[test]
fn test_publish_topic_validation() {
	assert!(validation::validate_publish_topic("sensors/room1/temp").is_ok());
	assert!(matches!(
		validation::validate_publish_topic("sensors/+/temp"),
		Err(TopicFilterError::WildcardInPublishTopic { .. })
	));
	assert!(matches!(
		validation::validate_publish_topic("sensors/#"),
		Err(TopicFilterError::WildcardInPublishTopic { .. })
	));
	assert_eq!(
		validation::validate_publish_topic(""),
		Err(TopicFilterError::EmptyTopic)
	);
}

#[test]
fn test_single_topic_normalized_to_one_filter() {
	let filters = TopicFilters::from("sensors/+/temp");
	assert_eq!(filters.len(), 1);
	let parsed = filters.parse().unwrap();
	assert_eq!(parsed[0].as_str(), "sensors/+/temp");
}

#[test]
fn test_filter_collections() {
	let from_array = TopicFilters::from(["a/#", "b/+"]);
	let from_vec = TopicFilters::from(vec![String::from("a/#"), "b/+".into()]);
	assert_eq!(from_array, from_vec);
	assert_eq!(from_array.parse().unwrap().len(), 2);
}

#[test]
fn test_empty_filter_set_rejected() {
	let filters = TopicFilters::from(Vec::<String>::new());
	assert!(filters.is_empty());
	assert_eq!(filters.parse(), Err(TopicFilterError::NoFilters));
}

#[test]
fn test_invalid_filter_in_set_rejected() {
	let filters = TopicFilters::from(["a/b", "a/#/c"]);
	assert!(filters.parse().is_err());
}
