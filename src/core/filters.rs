use std::collections::BTreeSet;

use crate::models::{BoundingBox, Record, TagFilter};

/// Normalise a single tag for case-insensitive matching
///
/// Returns `None` for tags that are empty after trimming.
#[inline]
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalise and de-duplicate a collection of tags
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|t| normalize_tag(t.as_ref()))
        .collect()
}

/// Split a comma-separated tag list as typed into the search form
///
/// `"ReactJS, Node.js,,"` yields `{"node.js", "reactjs"}`.
pub fn parse_tag_list(raw: &str) -> BTreeSet<String> {
    normalize_tags(raw.split(','))
}

/// Check whether a record falls inside a region and passes a tag filter
///
/// This is the single matching rule shared by searches and live subscriptions.
#[inline]
pub fn matches_region_and_tags(record: &Record, region: &BoundingBox, filter: &TagFilter) -> bool {
    region.contains(record.latitude, record.longitude) && filter.matches(&record.tags)
}
