//! Applies a [`NormalizationRuleGroup`]'s ordered rules to a stream name.
//!
//! A rule's `pattern`/`replacement` pair is either a literal substring
//! replace or, when `is_regex` is set, a full regex substitution. Rules
//! within a group run in `sort_order`, each seeing the previous rule's
//! output, matching spec.md §4.1's "normalize before evaluating
//! conditions" behavior for rules with `normalize_names` enabled.

use regex::Regex;

use crate::error::OrchestratorError;

#[derive(Debug, Clone)]
pub struct NormalizationRule {
    pub pattern: String,
    pub replacement: String,
    pub is_regex: bool,
}

/// Run every rule in `rules`, in order, against `input`.
pub fn apply_rules(input: &str, rules: &[NormalizationRule]) -> Result<String, OrchestratorError> {
    let mut current = input.to_string();
    for rule in rules {
        current = apply_one(&current, rule)?;
    }
    Ok(current)
}

fn apply_one(input: &str, rule: &NormalizationRule) -> Result<String, OrchestratorError> {
    if rule.is_regex {
        let re = Regex::new(&rule.pattern)
            .map_err(|e| OrchestratorError::InvalidNormalizationRule(e.to_string()))?;
        Ok(re.replace_all(input, rule.replacement.as_str()).into_owned())
    } else {
        Ok(input.replace(&rule.pattern, &rule.replacement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_replace_runs_in_order() {
        let rules = vec![
            NormalizationRule { pattern: "US: ".to_string(), replacement: String::new(), is_regex: false },
            NormalizationRule { pattern: "HD".to_string(), replacement: "".to_string(), is_regex: false },
        ];
        assert_eq!(apply_rules("US: ESPN HD", &rules).unwrap(), "ESPN ");
    }

    #[test]
    fn regex_replace() {
        let rules = vec![NormalizationRule {
            pattern: r"\s{2,}".to_string(),
            replacement: " ".to_string(),
            is_regex: true,
        }];
        assert_eq!(apply_rules("ESPN   HD", &rules).unwrap(), "ESPN HD");
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let rules = vec![NormalizationRule {
            pattern: "(".to_string(),
            replacement: "".to_string(),
            is_regex: true,
        }];
        assert!(apply_rules("ESPN", &rules).is_err());
    }

    #[test]
    fn empty_rule_set_is_identity() {
        assert_eq!(apply_rules("ESPN HD", &[]).unwrap(), "ESPN HD");
    }
}
