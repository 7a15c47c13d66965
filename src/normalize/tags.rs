//! Tag registry matching for the `tag_in` condition operator.
//!
//! A [`crate::db::models::Tag`] belongs to a named [`crate::db::models::TagGroup`]
//! (e.g. "Regional Sports Networks", "ABC Affiliates") and carries a
//! matching mode. The `tag_in` condition asks "does this stream's name
//! belong to any tag in group X", which this module answers without
//! touching the database — callers resolve the group's tags once per
//! pipeline run and pass them in.

use serde::{Deserialize, Serialize};

use super::callsign::contains_call_sign;
use super::text::normalize_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMode {
    Prefix,
    Suffix,
    Contains,
    Exact,
    CallSign,
}

impl TagMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "prefix" => Some(Self::Prefix),
            "suffix" => Some(Self::Suffix),
            "contains" => Some(Self::Contains),
            "exact" => Some(Self::Exact),
            "call_sign" => Some(Self::CallSign),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
            Self::Contains => "contains",
            Self::Exact => "exact",
            Self::CallSign => "call_sign",
        }
    }
}

/// One registered tag value and how it should be matched against a name.
#[derive(Debug, Clone)]
pub struct TagEntry {
    pub value: String,
    pub mode: TagMode,
}

/// Whether `name` satisfies `tag`, per its matching mode. Prefix/suffix/
/// contains/exact are matched on the normalized form of both sides so
/// that quality suffixes and punctuation don't cause spurious misses;
/// `CallSign` matches the FCC call sign embedded in `name` regardless of
/// surrounding text.
pub fn matches_tag(name: &str, tag: &TagEntry) -> bool {
    if tag.mode == TagMode::CallSign {
        return contains_call_sign(name, &tag.value);
    }

    let normalized_name = normalize_name(name);
    let normalized_tag = normalize_name(&tag.value);
    if normalized_tag.is_empty() {
        return false;
    }

    match tag.mode {
        TagMode::Prefix => normalized_name.starts_with(&normalized_tag),
        TagMode::Suffix => normalized_name.ends_with(&normalized_tag),
        TagMode::Contains => normalized_name.contains(&normalized_tag),
        TagMode::Exact => normalized_name == normalized_tag,
        TagMode::CallSign => unreachable!("handled above"),
    }
}

/// Whether `name` matches any tag in `tags` (the `tag_in` condition
/// semantics: membership in the group, not a specific tag).
pub fn matches_any_tag(name: &str, tags: &[TagEntry]) -> bool {
    tags.iter().any(|tag| matches_tag(name, tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(value: &str, mode: TagMode) -> TagEntry {
        TagEntry { value: value.to_string(), mode }
    }

    #[test]
    fn prefix_match() {
        assert!(matches_tag("ESPN HD", &tag("ESPN", TagMode::Prefix)));
        assert!(!matches_tag("Fox ESPN", &tag("ESPN", TagMode::Prefix)));
    }

    #[test]
    fn suffix_match() {
        assert!(matches_tag("Local News HD", &tag("News", TagMode::Suffix)));
    }

    #[test]
    fn contains_match() {
        assert!(matches_tag("USA Regional Sports Network HD", &tag("Regional Sports", TagMode::Contains)));
    }

    #[test]
    fn exact_match_ignores_quality() {
        assert!(matches_tag("ESPN HD", &tag("ESPN", TagMode::Exact)));
        assert!(!matches_tag("ESPN2 HD", &tag("ESPN", TagMode::Exact)));
    }

    #[test]
    fn call_sign_match_ignores_surrounding_text() {
        assert!(matches_tag("ABC 7 New York (WABC)", &tag("WABC", TagMode::CallSign)));
        assert!(!matches_tag("ABC 7 New York (WABC)", &tag("KABC", TagMode::CallSign)));
    }

    #[test]
    fn tag_mode_round_trips_through_strings() {
        for mode in [TagMode::Prefix, TagMode::Suffix, TagMode::Contains, TagMode::Exact, TagMode::CallSign] {
            assert_eq!(TagMode::parse(mode.as_str()), Some(mode));
        }
    }

    #[test]
    fn matches_any_tag_checks_membership() {
        let tags = vec![tag("ESPN", TagMode::Prefix), tag("Fox Sports", TagMode::Prefix)];
        assert!(matches_any_tag("ESPN2 HD", &tags));
        assert!(!matches_any_tag("CNN HD", &tags));
    }
}
