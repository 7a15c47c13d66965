//! FCC call-sign extraction.
//!
//! US and Canadian over-the-air affiliates are frequently listed by
//! providers under their call sign (WABC, KABC-TV, CFTO-DT) rather than a
//! network name. The `merge_streams` `target=auto` cascade and the
//! `tag_in` condition both need to recognize a call sign embedded in a
//! longer stream name so "WABC New York HD" and "ABC 7 New York (WABC)"
//! resolve to the same channel.

use regex::Regex;
use std::sync::OnceLock;

fn call_sign_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b([KW][A-Z]{2,3})(-(TV|DT|LD))?\b").unwrap())
}

/// The first US/Canadian-style call sign found in `name` (4-letter body,
/// leading K or W, optional `-TV`/`-DT`/`-LD` suffix stripped), uppercased.
pub fn extract_call_sign(name: &str) -> Option<String> {
    call_sign_regex()
        .captures(name)
        .map(|c| c[1].to_uppercase())
}

/// Whether `name` contains the given call sign, independent of suffix or
/// surrounding text.
pub fn contains_call_sign(name: &str, call_sign: &str) -> bool {
    extract_call_sign(name)
        .map(|found| found.eq_ignore_ascii_case(call_sign))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_call_sign() {
        assert_eq!(extract_call_sign("WABC New York HD"), Some("WABC".to_string()));
    }

    #[test]
    fn extracts_call_sign_with_suffix() {
        assert_eq!(extract_call_sign("KABC-TV Los Angeles"), Some("KABC".to_string()));
    }

    #[test]
    fn extracts_call_sign_in_parens() {
        assert_eq!(extract_call_sign("ABC 7 New York (WABC)"), Some("WABC".to_string()));
    }

    #[test]
    fn no_call_sign_found() {
        assert_eq!(extract_call_sign("ESPN HD"), None);
    }

    #[test]
    fn contains_call_sign_matches() {
        assert!(contains_call_sign("ABC 7 New York (WABC)", "WABC"));
        assert!(!contains_call_sign("ESPN HD", "WABC"));
    }
}
