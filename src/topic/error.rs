//! Error types and shared constants for the topic module

use thiserror::Error;

/// Errors produced while validating subscription filters and publish topics
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicFilterError {
	/// Filter or topic string is empty
	#[error("Topic cannot be empty")]
	EmptyTopic,

	/// Filter or topic exceeds the MQTT string length limit
	#[error("Topic is too long: {length} > {max}", max = limits::MAX_TOPIC_LENGTH)]
	TooLong {
		/// Length in bytes
		length: usize,
	},

	/// Wildcard character used in an illegal position
	#[error("Invalid wildcard usage in '{filter}': {reason}")]
	InvalidWildcard {
		/// Offending filter
		filter: String,
		/// What is wrong with it
		reason: String,
	},

	/// Topic contains a NUL character
	#[error("Topic '{topic}' contains a null character")]
	NullCharacter {
		/// Offending topic
		topic: String,
	},

	/// Publish topics must be concrete
	#[error("Publish topic '{topic}' must not contain wildcards")]
	WildcardInPublishTopic {
		/// Offending topic
		topic: String,
	},

	/// An empty set of filters was given to subscribe
	#[error("At least one topic filter is required")]
	NoFilters,
}

impl TopicFilterError {
	/// Creates a new InvalidWildcard error
	pub fn invalid_wildcard(
		filter: impl Into<String>,
		reason: impl Into<String>,
	) -> Self {
		Self::InvalidWildcard {
			filter: filter.into(),
			reason: reason.into(),
		}
	}
}

/// Protocol limits
pub mod limits {
	/// Maximum encoded length of an MQTT topic string
	pub const MAX_TOPIC_LENGTH: usize = 65_535;
}

/// Validation utilities for topic strings
pub mod validation {
	use super::TopicFilterError;
	use super::limits::MAX_TOPIC_LENGTH;

	fn validate_common(topic: &str) -> Result<(), TopicFilterError> {
		if topic.is_empty() {
			return Err(TopicFilterError::EmptyTopic);
		}
		if topic.len() > MAX_TOPIC_LENGTH {
			return Err(TopicFilterError::TooLong {
				length: topic.len(),
			});
		}
		if topic.contains('\0') {
			return Err(TopicFilterError::NullCharacter {
				topic: topic.to_string(),
			});
		}
		Ok(())
	}

	/// Validates a subscription filter.
	///
	/// `#` must be the whole last segment, `+` must be a whole segment.
	pub fn validate_filter(filter: &str) -> Result<(), TopicFilterError> {
		validate_common(filter)?;
		let mut segments = filter.split('/').peekable();
		while let Some(segment) = segments.next() {
			let is_last = segments.peek().is_none();
			if segment.contains('#') {
				if segment != "#" {
					return Err(TopicFilterError::invalid_wildcard(
						filter,
						"'#' must occupy an entire level",
					));
				}
				if !is_last {
					return Err(TopicFilterError::invalid_wildcard(
						filter,
						"'#' must be the last level",
					));
				}
			}
			if segment.contains('+') && segment != "+" {
				return Err(TopicFilterError::invalid_wildcard(
					filter,
					"'+' must occupy an entire level",
				));
			}
		}
		Ok(())
	}

	/// Validates a concrete topic used for publishing.
	pub fn validate_publish_topic(topic: &str) -> Result<(), TopicFilterError> {
		validate_common(topic)?;
		if topic.contains(['#', '+']) {
			return Err(TopicFilterError::WildcardInPublishTopic {
				topic: topic.to_string(),
			});
		}
		Ok(())
	}
}
