//! Fuzzy name matching.
//!
//! Adapted from this crate's original XMLTV-to-Xtream channel matcher:
//! the same normalize-then-score shape, generalized from a batch
//! all-pairs matcher into a single-query `best_match` the
//! `merge_streams` `target=auto` cascade calls as its last resort, after
//! exact normalized-name and call-sign matches have already failed.

use super::scorer::{calculate_match_score, FuzzyConfig};
use super::text::normalize_name;

/// One scored candidate returned by [`best_match`].
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub index: usize,
    pub confidence: f64,
}

/// Find the best-scoring candidate for `query` among `candidates`,
/// above `config.threshold`. Ties keep the earliest candidate (stable
/// sort by descending score only).
pub fn best_match(query: &str, candidates: &[&str], config: &FuzzyConfig) -> Option<FuzzyMatch> {
    let query_normalized = normalize_name(query);

    candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let candidate_normalized = normalize_name(candidate);
            let confidence = calculate_match_score(&query_normalized, &candidate_normalized, config);
            FuzzyMatch { index, confidence }
        })
        .filter(|m| m.confidence >= config.threshold)
        .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_best_candidate_above_threshold() {
        let config = FuzzyConfig::default();
        let candidates = ["CNN International", "ESPN HD", "ESPN East"];
        let result = best_match("ESPN", &candidates, &config).unwrap();
        assert_eq!(result.index, 1);
    }

    #[test]
    fn returns_none_below_threshold() {
        let config = FuzzyConfig::default();
        let candidates = ["Fox News", "CNBC"];
        assert!(best_match("ESPN", &candidates, &config).is_none());
    }

    #[test]
    fn exact_normalized_match_wins_over_fuzzy() {
        let config = FuzzyConfig::default();
        let candidates = ["ESPN 2", "ESPN HD"];
        let result = best_match("ESPN", &candidates, &config).unwrap();
        assert_eq!(result.index, 1);
    }
}
