//! Topic handling module
//!
//! Parsing and validation of subscription filters, and MQTT wildcard
//! matching of received topics against them.

pub mod error;
pub mod topic_filter;
pub mod topic_matcher;

#[cfg(test)]
mod topic_filter_tests;

pub use error::{TopicFilterError, limits, validation};
pub use topic_filter::{TopicFilter, TopicFilters};
pub use topic_matcher::matches;
