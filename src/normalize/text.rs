//! Name normalization shared by rule condition evaluation, the fuzzy
//! matcher, and the tag registry.
//!
//! Adapted from this crate's original channel-name normalizer
//! (`normalize_channel_name`): the same lowercase/strip-quality/strip-
//! punctuation/collapse-whitespace pipeline, generalized from a
//! one-shot XMLTV-to-Xtream matching helper into the primitive every
//! `name_normalized`-style condition and the merge cascade build on.

use regex::Regex;
use std::sync::OnceLock;

fn quality_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*[-]?\s*(hd|sd|fhd|4k|uhd|1080p|720p|480p|576p)(?:\s|$|\(|\))").unwrap())
}

fn non_alnum_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s]").unwrap())
}

fn multi_space_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Normalize a stream or channel name for comparison: lowercase, strip
/// quality suffixes, drop punctuation, collapse whitespace. This is the
/// value stored in `name_normalized` and compared by the `name_normalized`
/// condition operators.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let without_suffix = quality_suffix_regex().replace_all(&lowered, "");
    let without_punct = non_alnum_regex().replace_all(&without_suffix, " ");
    let collapsed = multi_space_regex().replace_all(&without_punct, " ");
    collapsed.trim().to_string()
}

/// Strip a leading "`NUMBER` | " or "`NUMBER` - " channel-number prefix,
/// e.g. "105 | ESPN HD" -> "ESPN HD". Providers frequently prepend the
/// channel number from their own lineup; rule conditions and the merge
/// cascade both want to ignore it.
pub fn strip_number_prefix(name: &str) -> &str {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*\d+\s*[|\-]\s*").unwrap());
    match re.find(name) {
        Some(m) => &name[m.end()..],
        None => name,
    }
}

/// Strip a trailing parenthesized qualifier, e.g. "ESPN (East)" -> "ESPN".
/// Used by the `merge_streams` `target=auto` cascade to fall back to a
/// channel's unqualified base name.
pub fn deparenthesize(name: &str) -> &str {
    let trimmed = name.trim_end();
    if trimmed.ends_with(')') {
        if let Some(open) = trimmed.rfind('(') {
            return trimmed[..open].trim_end();
        }
    }
    trimmed
}

/// Strip both the number prefix and a trailing parenthetical in one pass,
/// returning the channel's bare base name.
pub fn base_name(name: &str) -> String {
    deparenthesize(strip_number_prefix(name)).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_quality_and_punctuation() {
        assert_eq!(normalize_name("ESPN HD"), "espn");
        assert_eq!(normalize_name("ESPN - 4K"), "espn");
        assert_eq!(normalize_name("BBC One (UK)"), "bbc one uk");
    }

    #[test]
    fn normalize_preserves_numbers() {
        assert_eq!(normalize_name("FOX Sports 1"), "fox sports 1");
    }

    #[test]
    fn strips_channel_number_prefix() {
        assert_eq!(strip_number_prefix("105 | ESPN HD"), "ESPN HD");
        assert_eq!(strip_number_prefix("12 - CNN"), "CNN");
        assert_eq!(strip_number_prefix("ESPN HD"), "ESPN HD");
    }

    #[test]
    fn deparenthesize_strips_trailing_qualifier() {
        assert_eq!(deparenthesize("ESPN (East)"), "ESPN");
        assert_eq!(deparenthesize("ESPN"), "ESPN");
    }

    #[test]
    fn base_name_combines_both() {
        assert_eq!(base_name("105 | ESPN (East) HD"), "ESPN (East) HD");
        assert_eq!(base_name("24 | WABC (New York)"), "WABC");
    }
}
