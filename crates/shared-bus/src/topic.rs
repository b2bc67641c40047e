//! # Topic Names and Filters
//!
//! MQTT-style hierarchical topics. Levels are separated by `/`.
//!
//! - `+` matches exactly one level.
//! - `#` matches any number of remaining levels, including none. It must be
//!   the last level of a filter.
//! - Topics whose first level starts with `$` are never matched by a filter
//!   that starts with a wildcard.

use crate::transport::TransportError;

/// Single-level wildcard.
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Multi-level wildcard.
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Level separator.
pub const LEVEL_SEPARATOR: char = '/';

/// Validate a concrete topic name used for publishing.
///
/// # Errors
///
/// `TransportError::InvalidTopic` if the name is empty or contains a wildcard
/// or a NUL character.
pub fn validate_topic_name(topic: &str) -> Result<(), TransportError> {
    if topic.is_empty() {
        return Err(TransportError::InvalidTopic("empty topic".to_string()));
    }
    if topic.contains(['+', '#', '\0']) {
        return Err(TransportError::InvalidTopic(format!(
            "wildcards are not allowed in topic names: {topic}"
        )));
    }
    Ok(())
}

/// Validate a subscription filter.
///
/// # Errors
///
/// `TransportError::InvalidFilter` if a wildcard shares a level with other
/// characters or `#` is not the last level.
pub fn validate_filter(filter: &str) -> Result<(), TransportError> {
    if filter.is_empty() {
        return Err(TransportError::InvalidFilter("empty filter".to_string()));
    }
    if filter.contains('\0') {
        return Err(TransportError::InvalidFilter(format!(
            "NUL character in filter: {filter}"
        )));
    }

    let levels: Vec<&str> = filter.split(LEVEL_SEPARATOR).collect();
    let last = levels.len() - 1;
    for (index, level) in levels.iter().enumerate() {
        let has_wildcard = level.contains(['+', '#']);
        if has_wildcard && *level != SINGLE_LEVEL_WILDCARD && *level != MULTI_LEVEL_WILDCARD {
            return Err(TransportError::InvalidFilter(format!(
                "wildcard must occupy a whole level: {filter}"
            )));
        }
        if *level == MULTI_LEVEL_WILDCARD && index != last {
            return Err(TransportError::InvalidFilter(format!(
                "'#' must be the last level: {filter}"
            )));
        }
    }
    Ok(())
}

/// Check whether `topic` is matched by `filter`.
///
/// Both arguments are assumed valid; see [`validate_topic_name`] and
/// [`validate_filter`].
#[must_use]
pub fn filter_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split(LEVEL_SEPARATOR);
    let mut topic_levels = topic.split(LEVEL_SEPARATOR);

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some(MULTI_LEVEL_WILDCARD), _) => return true,
            (Some(SINGLE_LEVEL_WILDCARD), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
