//! Quality-tier detection for stream and channel names.
//!
//! Adapted from this crate's original channel-quality grouping feature:
//! the same tier regexes, generalized so the `ActionExecutor`'s
//! `name_template` can expose both `{quality}` (the detected tier) and
//! `{quality_raw}` (the literal substring that was matched) per spec.md
//! §4.2.

use regex::Regex;
use std::sync::OnceLock;

fn quality_4k() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(4K|UHD|2160[pPi])\b").unwrap())
}

fn quality_fhd() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(FHD|1080[pPi])\b").unwrap())
}

fn quality_hd_720p() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b720[pPi]\b").unwrap())
}

fn quality_sd() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bSD\b|(?i)\b(480[pPi]|576[pPi])\b").unwrap())
}

/// The highest-priority quality tier detected in `name`, and the raw
/// substring that matched it. Defaults to `("SD", "SD")` when nothing is
/// detected, matching this crate's existing default-to-SD behavior.
pub fn detect_quality(name: &str) -> (&'static str, String) {
    if let Some(m) = quality_4k().find(name) {
        return ("4K", m.as_str().to_string());
    }
    if let Some(m) = quality_fhd().find(name) {
        return ("FHD", m.as_str().to_string());
    }
    if let Some(m) = quality_hd_720p().find(name) {
        return ("HD", m.as_str().to_string());
    }
    if has_standalone_hd(name) {
        return ("HD", "HD".to_string());
    }
    if let Some(m) = quality_sd().find(name) {
        return ("SD", m.as_str().to_string());
    }
    ("SD", "SD".to_string())
}

/// All quality tiers present in `name` (a name can carry more than one,
/// e.g. "ESPN HD / SD Simulcast").
pub fn detect_qualities(name: &str) -> Vec<String> {
    let mut qualities = Vec::new();
    if quality_4k().is_match(name) {
        qualities.push("4K".to_string());
    }
    if quality_fhd().is_match(name) {
        qualities.push("FHD".to_string());
    }
    if quality_hd_720p().is_match(name) || has_standalone_hd(name) {
        qualities.push("HD".to_string());
    }
    if quality_sd().is_match(name) {
        qualities.push("SD".to_string());
    }
    if qualities.is_empty() {
        qualities.push("SD".to_string());
    }
    qualities
}

fn has_standalone_hd(name: &str) -> bool {
    let upper = name.to_uppercase();
    let mut idx = 0;
    while let Some(pos) = upper[idx..].find("HD") {
        let absolute_pos = idx + pos;
        let preceded_by_f_or_u = absolute_pos > 0
            && matches!(upper.chars().nth(absolute_pos - 1), Some('F') | Some('U'));
        let at_word_start = absolute_pos == 0
            || upper.chars().nth(absolute_pos - 1).map(|c| !c.is_alphanumeric()).unwrap_or(true);
        let after_hd = absolute_pos + 2;
        let at_word_end = after_hd >= upper.len()
            || upper.chars().nth(after_hd).map(|c| !c.is_alphanumeric()).unwrap_or(true);

        if at_word_start && at_word_end && !preceded_by_f_or_u {
            return true;
        }
        idx = absolute_pos + 2;
        if idx >= upper.len() {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_4k_variants() {
        assert_eq!(detect_quality("ESPN 4K").0, "4K");
        assert_eq!(detect_quality("CNN UHD").0, "4K");
        assert_eq!(detect_quality("HBO 2160p").0, "4K");
    }

    #[test]
    fn detects_fhd_before_hd() {
        assert_eq!(detect_quality("ESPN FHD").0, "FHD");
        assert_eq!(detect_quality("Sports 1080p").0, "FHD");
    }

    #[test]
    fn hd_not_detected_inside_fhd_or_uhd() {
        let qualities = detect_qualities("ESPN FHD");
        assert!(qualities.contains(&"FHD".to_string()));
        assert!(!qualities.contains(&"HD".to_string()));
    }

    #[test]
    fn defaults_to_sd() {
        assert_eq!(detect_quality("Local News"), ("SD", "SD".to_string()));
    }

    #[test]
    fn standalone_hd_detected() {
        assert_eq!(detect_quality("ESPN HD").0, "HD");
    }
}
