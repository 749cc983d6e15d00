use std::convert::TryFrom;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::slice::Iter;

use arcstr::{ArcStr, Substr};

use super::error::{TopicFilterError, limits, validation};
use super::topic_path::Topic;

/// One level of a parsed topic filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicFilterItem {
	/// Literal level, compared case-sensitively
	Str(Substr),
	/// `+`, matches exactly one level
	Plus,
	/// `#`, matches zero or more trailing levels
	Hash,
}

impl TopicFilterItem {
	pub fn as_str(&self) -> &str {
		match self {
			| TopicFilterItem::Str(s) => s,
			| TopicFilterItem::Plus => "+",
			| TopicFilterItem::Hash => "#",
		}
	}

	pub fn is_wildcard(&self) -> bool {
		!matches!(self, TopicFilterItem::Str(_))
	}
}

impl fmt::Display for TopicFilterItem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl TryFrom<Substr> for TopicFilterItem {
	type Error = TopicFilterError;

	fn try_from(item: Substr) -> Result<Self, Self::Error> {
		let res = match item.as_str() {
			| "+" => TopicFilterItem::Plus,
			| "#" => TopicFilterItem::Hash,
			| _ if item.contains([
				limits::SINGLE_LEVEL_WILDCARD,
				limits::MULTI_LEVEL_WILDCARD,
			]) =>
			{
				return Err(TopicFilterError::wildcard_usage(item.as_str()));
			}
			| _ => TopicFilterItem::Str(item),
		};
		Ok(res)
	}
}

/// A validated MQTT topic filter.
///
/// The filter string is parsed once, at registration time; matching a
/// concrete [`Topic`] only walks the pre-parsed levels. Equality and hashing
/// use the filter string as written, so a filter can key the invocation cache.
#[derive(Debug, Clone)]
pub struct TopicFilter {
	filter: ArcStr,
	segments: Vec<TopicFilterItem>,
}

impl TopicFilter {
	pub fn new(filter: impl Into<ArcStr>) -> Result<Self, TopicFilterError> {
		let filter = filter.into();
		if filter.is_empty() {
			return Err(TopicFilterError::EmptyFilter);
		}
		if !validation::is_valid_length(&filter) {
			return Err(TopicFilterError::TooLong {
				len: filter.len(),
				limit: limits::MAX_TOPIC_LENGTH,
			});
		}

		let segments = filter
			.split(limits::LEVEL_SEPARATOR)
			.map(|s| filter.substr_from(s))
			.map(TopicFilterItem::try_from)
			.collect::<Result<Vec<_>, _>>()?;

		if let Some(hash_pos) = segments
			.iter()
			.position(|s| matches!(*s, TopicFilterItem::Hash))
		{
			if hash_pos != segments.len() - 1 {
				return Err(TopicFilterError::hash_position(filter.as_str()));
			}
		}

		Ok(Self { filter, segments })
	}

	pub fn as_str(&self) -> &str {
		&self.filter
	}

	pub fn as_arcstr(&self) -> &ArcStr {
		&self.filter
	}

	pub fn iter(&self) -> Iter<'_, TopicFilterItem> {
		self.segments.iter()
	}

	pub fn len(&self) -> usize {
		self.segments.len()
	}

	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	pub fn has_wildcards(&self) -> bool {
		self.segments.iter().any(TopicFilterItem::is_wildcard)
	}

	/// Returns true if `topic` satisfies this filter.
	pub fn matches(&self, topic: &Topic) -> bool {
		let mut topic_segments = topic.segments();
		for item in &self.segments {
			match item {
				// Validated to be the last level
				| TopicFilterItem::Hash => return true,
				| TopicFilterItem::Plus => {
					if topic_segments.next().is_none() {
						return false;
					}
				}
				| TopicFilterItem::Str(expected) => {
					if topic_segments.next() != Some(expected.as_str()) {
						return false;
					}
				}
			}
		}
		topic_segments.next().is_none()
	}

	/// Returns true if every topic matched by `other` is also matched by
	/// this filter.
	pub fn covers(&self, other: &TopicFilter) -> bool {
		let mut others = other.segments.iter();
		for item in &self.segments {
			match (item, others.next()) {
				| (TopicFilterItem::Hash, _) => return true,
				| (_, None) => return false,
				| (TopicFilterItem::Plus, Some(TopicFilterItem::Hash)) => {
					return false;
				}
				| (TopicFilterItem::Plus, Some(_)) => {}
				| (TopicFilterItem::Str(a), Some(TopicFilterItem::Str(b)))
					if a == b => {}
				| (TopicFilterItem::Str(_), Some(_)) => return false,
			}
		}
		others.next().is_none()
	}
}

/// Matches a raw filter string against a raw topic string.
///
/// Pure and allocation free. The filter is not validated here; a `#` that
/// is not the final level only matches when nothing follows it, i.e. never
/// for a well-formed filter. Use [`TopicFilter`] to validate once up front.
pub fn matches(filter: &str, topic: &str) -> bool {
	let mut topic_segments = topic.split(limits::LEVEL_SEPARATOR);
	let mut filter_segments = filter.split(limits::LEVEL_SEPARATOR).peekable();
	while let Some(segment) = filter_segments.next() {
		match segment {
			| "#" => return filter_segments.peek().is_none(),
			| "+" => {
				if topic_segments.next().is_none() {
					return false;
				}
			}
			| literal => {
				if topic_segments.next() != Some(literal) {
					return false;
				}
			}
		}
	}
	topic_segments.next().is_none()
}

impl PartialEq for TopicFilter {
	fn eq(&self, other: &Self) -> bool {
		self.filter == other.filter
	}
}

impl Eq for TopicFilter {}

impl Hash for TopicFilter {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.filter.hash(state);
	}
}

impl TryFrom<&str> for TopicFilter {
	type Error = TopicFilterError;

	fn try_from(filter: &str) -> Result<Self, Self::Error> {
		TopicFilter::new(filter)
	}
}

impl fmt::Display for TopicFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.filter)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn filter(value: &str) -> TopicFilter {
		TopicFilter::new(value).unwrap()
	}

	#[test]
	fn test_simple_string_filter() {
		let result = filter("simple/path");
		assert_eq!(
			result.segments,
			vec![
				TopicFilterItem::Str(Substr::from("simple")),
				TopicFilterItem::Str(Substr::from("path"))
			]
		);
		assert!(!result.has_wildcards());
	}

	#[test]
	fn test_filter_with_plus() {
		let result = filter("devices/+/status");
		assert_eq!(
			result.segments,
			vec![
				TopicFilterItem::Str(Substr::from("devices")),
				TopicFilterItem::Plus,
				TopicFilterItem::Str(Substr::from("status"))
			]
		);
		assert!(result.has_wildcards());
	}

	#[test]
	fn test_filter_with_both_wildcards() {
		let result = filter("home/+/device/#");
		assert_eq!(
			result.segments,
			vec![
				TopicFilterItem::Str(Substr::from("home")),
				TopicFilterItem::Plus,
				TopicFilterItem::Str(Substr::from("device")),
				TopicFilterItem::Hash
			]
		);
	}

	#[test]
	fn test_empty_string() {
		assert_eq!(TopicFilter::new(""), Err(TopicFilterError::EmptyFilter));
	}

	#[test]
	fn test_only_wildcards() {
		assert_eq!(filter("+").segments, vec![TopicFilterItem::Plus]);
		assert_eq!(filter("#").segments, vec![TopicFilterItem::Hash]);
	}

	#[test]
	fn test_consecutive_separators() {
		assert_eq!(
			filter("topic//subtopic").segments,
			vec![
				TopicFilterItem::Str(Substr::from("topic")),
				TopicFilterItem::Str(Substr::from("")),
				TopicFilterItem::Str(Substr::from("subtopic"))
			]
		);
	}

	#[test]
	fn test_invalid_hash_wildcard_position() {
		assert_eq!(
			TopicFilter::new("invalid/#/pattern"),
			Err(TopicFilterError::HashPosition {
				filter: "invalid/#/pattern".to_string()
			})
		);
	}

	#[test]
	fn test_invalid_wildcards_format() {
		for bad in ["topic/++/subtopic", "topic/##", "topic/a+b", "a#b/c"] {
			assert!(
				matches!(
					TopicFilter::new(bad),
					Err(TopicFilterError::WildcardUsage { .. })
				),
				"{bad} should be rejected"
			);
		}
	}

	#[test]
	fn test_equality_uses_filter_string() {
		assert_eq!(filter("a/+/c"), filter("a/+/c"));
		assert_ne!(filter("a/+/c"), filter("a/+/d"));
	}

	#[test]
	fn test_display_implementation() {
		for value in ["simple/path", "devices/+/status", "sensors/#", "/", "a//b"]
		{
			assert_eq!(filter(value).to_string(), value);
		}
	}

	#[test]
	fn test_covers() {
		assert!(filter("#").covers(&filter("a/b/c")));
		assert!(filter("a/#").covers(&filter("a")));
		assert!(filter("a/#").covers(&filter("a/+/c")));
		assert!(filter("a/+").covers(&filter("a/b")));
		assert!(filter("a/b").covers(&filter("a/b")));

		assert!(!filter("a/+").covers(&filter("a/#")));
		assert!(!filter("+").covers(&filter("a/b")));
		assert!(!filter("a/b").covers(&filter("a/+")));
		assert!(!filter("a/b/c").covers(&filter("a/b")));
		assert!(!filter("a").covers(&filter("a/#")));
	}
}
