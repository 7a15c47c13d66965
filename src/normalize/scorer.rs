//! Fuzzy match confidence scoring.
//!
//! Carried over unchanged in method from this crate's original channel
//! matcher: Jaro-Winkler similarity with an optional boost when the
//! normalized names are identical. The EPG-id boost from the original
//! matcher has no counterpart here (EPG assignment is an explicit
//! action, not a scored match) and was dropped.

use strsim::jaro_winkler;

/// Tuning for [`super::fuzzy::best_match`]. `exact_name_boost` rewards
/// candidates whose normalized name is byte-identical to the query, on
/// top of their already-maximal Jaro-Winkler score, keeping them first
/// among ties after clamping.
#[derive(Debug, Clone)]
pub struct FuzzyConfig {
    pub threshold: f64,
    pub exact_name_boost: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            exact_name_boost: 0.10,
        }
    }
}

/// Score a normalized query against a normalized candidate name.
pub fn calculate_match_score(query_normalized: &str, candidate_normalized: &str, config: &FuzzyConfig) -> f64 {
    let base_score = jaro_winkler(query_normalized, candidate_normalized);
    let exact_boost = if query_normalized == candidate_normalized {
        config.exact_name_boost
    } else {
        0.0
    };
    (base_score + exact_boost).min(1.0)
}

/// The raw Jaro-Winkler similarity between two strings, with no boosts.
pub fn jaro_winkler_score(s1: &str, s2: &str) -> f64 {
    jaro_winkler(s1, s2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> FuzzyConfig {
        FuzzyConfig::default()
    }

    #[test]
    fn exact_match_clamps_to_one() {
        let config = default_config();
        let score = calculate_match_score("espn", "espn", &config);
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fuzzy_match_is_high_but_not_perfect() {
        let config = default_config();
        let score = calculate_match_score("espn", "espn east", &config);
        assert!(score > 0.7);
        assert!(score < 1.0);
    }

    #[test]
    fn low_similarity_scores_low() {
        let config = default_config();
        let score = calculate_match_score("cnn", "fox news", &config);
        assert!(score < 0.5);
    }

    #[test]
    fn jaro_winkler_raw_matches_strsim() {
        assert!((jaro_winkler_score("espn", "espn") - 1.0).abs() < f64::EPSILON);
        assert!(jaro_winkler_score("cnn", "fox") < 0.5);
    }
}
