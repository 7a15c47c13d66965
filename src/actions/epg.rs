//! EPG assignment cascade for the `assign_epg` action.
//!
//! spec.md §4.2 walks the cascade in a fixed order and stops at the first
//! step that produces a match: exact tvg_id, exact normalized name, call
//! sign pulled from a parenthesized form, prefix match (tie-broken by
//! length similarity), then — only if the source has exactly one entry —
//! a single-entry fallback for dummy/placeholder EPGs.

use crate::normalize::{deparenthesize, extract_call_sign, normalize_name};
use crate::upstream::EpgDataEntry;

const MIN_PREFIX_LEN: usize = 4;

/// Resolve the best [`EpgDataEntry`] for `channel_name`/`tvg_id` out of a
/// single EPG source's entries, per the cascade above.
pub fn resolve_epg_entry<'a>(
    channel_name: &str,
    tvg_id: Option<&str>,
    entries: &'a [EpgDataEntry],
) -> Option<&'a EpgDataEntry> {
    if let Some(tvg_id) = tvg_id {
        if let Some(entry) = entries.iter().find(|e| e.tvg_id.eq_ignore_ascii_case(tvg_id)) {
            return Some(entry);
        }
    }

    let normalized = normalize_name(channel_name);
    if let Some(entry) = entries.iter().find(|e| normalize_name(&e.name) == normalized) {
        return Some(entry);
    }

    if let Some(call_sign) = extract_call_sign(deparenthesize(channel_name)) {
        if let Some(entry) = entries
            .iter()
            .find(|e| extract_call_sign(&e.name).as_deref() == Some(call_sign.as_str()))
        {
            return Some(entry);
        }
    }

    if let Some(entry) = best_prefix_match(&normalized, entries) {
        return Some(entry);
    }

    if entries.len() == 1 {
        return entries.first();
    }

    None
}

fn best_prefix_match<'a>(normalized: &str, entries: &'a [EpgDataEntry]) -> Option<&'a EpgDataEntry> {
    if normalized.len() < MIN_PREFIX_LEN {
        return None;
    }

    entries
        .iter()
        .filter_map(|entry| {
            let candidate = normalize_name(&entry.name);
            let prefix_len = common_prefix_len(normalized, &candidate);
            if prefix_len >= MIN_PREFIX_LEN {
                let len_diff = (normalized.len() as i64 - candidate.len() as i64).unsigned_abs();
                Some((prefix_len, len_diff, entry))
            } else {
                None
            }
        })
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, _, entry)| entry)
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, tvg_id: &str, name: &str) -> EpgDataEntry {
        EpgDataEntry { id, tvg_id: tvg_id.to_string(), name: name.to_string() }
    }

    #[test]
    fn exact_tvg_id_wins_first() {
        let entries = vec![entry(1, "espn.us", "ESPN"), entry(2, "other", "ESPN Alt")];
        let result = resolve_epg_entry("ESPN HD", Some("espn.us"), &entries).unwrap();
        assert_eq!(result.id, 1);
    }

    #[test]
    fn exact_normalized_name_when_no_tvg_id() {
        let entries = vec![entry(1, "x", "ESPN"), entry(2, "y", "ESPN 2")];
        let result = resolve_epg_entry("ESPN HD", None, &entries).unwrap();
        assert_eq!(result.id, 1);
    }

    #[test]
    fn call_sign_from_parenthesized_form() {
        let entries = vec![entry(1, "x", "WABC-TV")];
        let result = resolve_epg_entry("ABC 7 New York (WABC)", None, &entries).unwrap();
        assert_eq!(result.id, 1);
    }

    #[test]
    fn prefix_match_tie_broken_by_length_similarity() {
        let entries = vec![entry(1, "x", "ESPNews Extended Channel"), entry(2, "y", "ESPNews")];
        let result = resolve_epg_entry("ESPNews HD", None, &entries).unwrap();
        assert_eq!(result.id, 2);
    }

    #[test]
    fn single_entry_fallback_for_dummy_epg() {
        let entries = vec![entry(1, "dummy", "Placeholder Guide")];
        let result = resolve_epg_entry("Totally Unrelated Name", None, &entries).unwrap();
        assert_eq!(result.id, 1);
    }

    #[test]
    fn no_match_when_multiple_entries_and_nothing_fits() {
        let entries = vec![entry(1, "x", "Alpha"), entry(2, "y", "Beta")];
        assert!(resolve_epg_entry("Totally Unrelated", None, &entries).is_none());
    }
}
