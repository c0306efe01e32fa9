//! Subscription filters

use std::convert::TryFrom;
use std::fmt::{self, Display};

use arcstr::{ArcStr, Substr};

use super::error::{TopicFilterError, validation};
use super::topic_matcher::{self, MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD};

/// Parsed MQTT subscription filter, e.g. `sensors/+/temp` or `alerts/#`.
///
/// Segments share the original string's allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter {
	pattern: ArcStr,
	segments: Vec<Substr>,
}

impl TopicFilter {
	/// Parses and validates a subscription filter.
	pub fn new(pattern: impl Into<ArcStr>) -> Result<Self, TopicFilterError> {
		let pattern = pattern.into();
		validation::validate_filter(&pattern)?;
		let segments = pattern
			.split('/')
			.map(|segment| pattern.substr_from(segment))
			.collect();
		Ok(Self { pattern, segments })
	}

	/// The filter as sent to the broker.
	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	/// Filter segments, split on `/`.
	pub fn segments(&self) -> &[Substr] {
		&self.segments
	}

	/// Whether the filter contains `+` or `#`.
	pub fn has_wildcards(&self) -> bool {
		self.segments.iter().any(|segment| {
			segment == SINGLE_LEVEL_WILDCARD || segment == MULTI_LEVEL_WILDCARD
		})
	}

	/// Checks a received topic against this filter.
	pub fn matches(&self, topic: &str) -> bool {
		let topic_segments: Vec<&str> = topic.split('/').collect();
		self.matches_segments(&topic_segments)
	}

	/// Checks already split topic segments against this filter.
	pub fn matches_segments<T: AsRef<str>>(&self, topic: &[T]) -> bool {
		topic_matcher::matches(&self.segments, topic)
	}
}

impl Display for TopicFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.pattern)
	}
}

impl AsRef<str> for TopicFilter {
	fn as_ref(&self) -> &str {
		&self.pattern
	}
}

impl TryFrom<&str> for TopicFilter {
	type Error = TopicFilterError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl TryFrom<String> for TopicFilter {
	type Error = TopicFilterError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl TryFrom<ArcStr> for TopicFilter {
	type Error = TopicFilterError;

	fn try_from(value: ArcStr) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

/// One or more filter strings given to `subscribe`.
///
/// Built from a single topic (`&str`, `String`) or a collection of them, so
/// both `client.subscribe("a/b", ..)` and `client.subscribe(["a", "b"], ..)`
/// work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilters(Vec<ArcStr>);

impl TopicFilters {
	/// Parses every filter. Fails on the first invalid one or on an empty set.
	pub fn parse(&self) -> Result<Vec<TopicFilter>, TopicFilterError> {
		if self.0.is_empty() {
			return Err(TopicFilterError::NoFilters);
		}
		self.0.iter().cloned().map(TopicFilter::new).collect()
	}

	/// Number of filters.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether no filter was given.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<&str> for TopicFilters {
	fn from(value: &str) -> Self {
		Self(vec![ArcStr::from(value)])
	}
}

impl From<String> for TopicFilters {
	fn from(value: String) -> Self {
		Self(vec![ArcStr::from(value)])
	}
}

impl From<&String> for TopicFilters {
	fn from(value: &String) -> Self {
		Self(vec![ArcStr::from(value.as_str())])
	}
}

impl<S: AsRef<str>> From<Vec<S>> for TopicFilters {
	fn from(value: Vec<S>) -> Self {
		Self(value.iter().map(|s| ArcStr::from(s.as_ref())).collect())
	}
}

impl<S: AsRef<str>> From<&[S]> for TopicFilters {
	fn from(value: &[S]) -> Self {
		Self(value.iter().map(|s| ArcStr::from(s.as_ref())).collect())
	}
}

impl<S: AsRef<str>, const N: usize> From<[S; N]> for TopicFilters {
	fn from(value: [S; N]) -> Self {
		Self(value.iter().map(|s| ArcStr::from(s.as_ref())).collect())
	}
}
