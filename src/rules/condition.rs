//! Pure condition evaluation.
//!
//! Given a stream and a rule, returns a match verdict plus a complete
//! per-condition trace — spec.md §4.1 requires the trace even for
//! conditions that didn't decide the outcome, so evaluation never
//! short-circuits.

use regex::Regex;

use crate::normalize::{matches_any_tag, normalize_name};
use crate::upstream::Stream;

use super::model::{Condition, ConditionType, Connector, Rule};
use super::registry::TagRegistry;

/// A stream snapshot plus any fields the pipeline has refreshed since
/// load (probe-on-sort may fill in `resolution_height` after the initial
/// snapshot).
#[derive(Debug, Clone)]
pub struct StreamFacts<'a> {
    pub stream: &'a Stream,
    pub resolution_height: Option<u32>,
}

impl<'a> StreamFacts<'a> {
    pub fn new(stream: &'a Stream) -> Self {
        Self { resolution_height: stream.resolution_height, stream }
    }

    pub fn name(&self) -> &str {
        &self.stream.name
    }
}

#[derive(Debug, Clone)]
pub struct ConditionLogEntry {
    pub condition_type: String,
    pub value: String,
    pub matched: bool,
    pub details: String,
    pub connector: Connector,
}

#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub matched: bool,
    pub conditions_log: Vec<ConditionLogEntry>,
}

pub struct ConditionEvaluator<'a> {
    registry: &'a TagRegistry,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(registry: &'a TagRegistry) -> Self {
        Self { registry }
    }

    pub fn evaluate(&self, facts: &StreamFacts, rule: &Rule) -> EvaluationResult {
        let mut log = Vec::with_capacity(rule.conditions.len());
        for condition in &rule.conditions {
            log.push(self.evaluate_one(facts, condition));
        }

        let matched = any_and_group_matches(&log);
        EvaluationResult { matched, conditions_log: log }
    }

    fn evaluate_one(&self, facts: &StreamFacts, condition: &Condition) -> ConditionLogEntry {
        let (raw_matched, value, details) = match &condition.kind {
            ConditionType::NameContains(needle) => {
                let m = facts.name().to_lowercase().contains(&needle.to_lowercase());
                (m, needle.clone(), format!("name={:?}", facts.name()))
            }
            ConditionType::NameRegex(pattern) => match Regex::new(pattern) {
                Ok(re) => {
                    let m = re.is_match(facts.name());
                    (m, pattern.clone(), format!("name={:?}", facts.name()))
                }
                Err(e) => (false, pattern.clone(), format!("invalid regex: {e}")),
            },
            ConditionType::GroupEquals(expected) => {
                let group = facts.stream.group_name.as_deref().unwrap_or("");
                let m = group.eq_ignore_ascii_case(expected);
                (m, expected.clone(), format!("group={group:?}"))
            }
            ConditionType::TagIn(group_name) => {
                let tags = self.registry.group_tags(group_name);
                let m = matches_any_tag(facts.name(), tags);
                (m, group_name.clone(), format!("checked {} tags", tags.len()))
            }
            ConditionType::TvgPresent => {
                let present = facts.stream.tvg_id.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false);
                (present, String::new(), format!("tvg_id={:?}", facts.stream.tvg_id))
            }
            ConditionType::ResolutionGe(threshold) => match facts.resolution_height {
                Some(height) => (height >= *threshold, threshold.to_string(), format!("resolution_height={height}")),
                None => (false, threshold.to_string(), "resolution_height unknown".to_string()),
            },
            ConditionType::Always => (true, String::new(), "always matches".to_string()),
            ConditionType::Unknown(raw) => (false, raw.clone(), "unrecognized condition type".to_string()),
        };

        let matched = if condition.negate { !raw_matched } else { raw_matched };

        ConditionLogEntry {
            condition_type: condition_type_label(&condition.kind),
            value,
            matched,
            details,
            connector: condition.connector,
        }
    }
}

fn condition_type_label(kind: &ConditionType) -> String {
    match kind {
        ConditionType::NameContains(_) => "name_contains",
        ConditionType::NameRegex(_) => "name_regex",
        ConditionType::GroupEquals(_) => "group_equals",
        ConditionType::TagIn(_) => "tag_in",
        ConditionType::TvgPresent => "tvg_present",
        ConditionType::ResolutionGe(_) => "resolution_ge",
        ConditionType::Always => "always",
        ConditionType::Unknown(_) => "unknown",
    }
    .to_string()
}

/// Splits the trace into OR-separated AND-groups (a new group starts at
/// every condition whose `connector` is `Or`, the first condition always
/// opening group 0) and returns whether any group is all-true.
fn any_and_group_matches(log: &[ConditionLogEntry]) -> bool {
    if log.is_empty() {
        return false;
    }

    let mut groups: Vec<Vec<&ConditionLogEntry>> = vec![Vec::new()];
    for (i, entry) in log.iter().enumerate() {
        if i > 0 && entry.connector == Connector::Or {
            groups.push(Vec::new());
        }
        groups.last_mut().unwrap().push(entry);
    }

    groups.iter().any(|group| group.iter().all(|entry| entry.matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{Action, OrphanAction, SortOrder};

    fn stream(name: &str, group: Option<&str>) -> Stream {
        Stream {
            id: 1,
            name: name.to_string(),
            url: "http://example/stream".to_string(),
            group_name: group.map(|g| g.to_string()),
            tvg_id: None,
            tvg_name: None,
            logo_url: None,
            provider_id: 1,
            provider_name: "provider".to_string(),
            resolution_height: None,
            normalized_name: None,
        }
    }

    fn rule_with(conditions: Vec<Condition>) -> Rule {
        Rule {
            id: 1,
            name: "r".to_string(),
            enabled: true,
            priority: 10,
            provider_id: None,
            target_group_id: None,
            starting_channel_number: None,
            conditions,
            actions: vec![Action::LogMatch { message: None }],
            stop_on_first_match: true,
            sort_field: None,
            sort_order: SortOrder::Asc,
            probe_on_sort: false,
            normalize_names: false,
            orphan_action: OrphanAction::None,
            managed_channel_ids: None,
            match_count: 0,
            last_run_at: None,
        }
    }

    #[test]
    fn single_and_group_requires_all_true() {
        let registry = TagRegistry::default();
        let evaluator = ConditionEvaluator::new(&registry);
        let rule = rule_with(vec![
            Condition { kind: ConditionType::NameContains("ESPN".to_string()), connector: Connector::And, negate: false },
            Condition { kind: ConditionType::GroupEquals("Sports".to_string()), connector: Connector::And, negate: false },
        ]);

        let s = stream("ESPN HD", Some("Sports"));
        let result = evaluator.evaluate(&StreamFacts::new(&s), &rule);
        assert!(result.matched);
        assert_eq!(result.conditions_log.len(), 2);

        let s2 = stream("ESPN HD", Some("News"));
        let result2 = evaluator.evaluate(&StreamFacts::new(&s2), &rule);
        assert!(!result2.matched);
    }

    #[test]
    fn or_connector_starts_new_group() {
        let registry = TagRegistry::default();
        let evaluator = ConditionEvaluator::new(&registry);
        let rule = rule_with(vec![
            Condition { kind: ConditionType::NameContains("ESPN".to_string()), connector: Connector::And, negate: false },
            Condition { kind: ConditionType::NameContains("FOX".to_string()), connector: Connector::Or, negate: false },
        ]);

        let espn = stream("ESPN HD", None);
        assert!(evaluator.evaluate(&StreamFacts::new(&espn), &rule).matched);

        let fox = stream("FOX Sports", None);
        assert!(evaluator.evaluate(&StreamFacts::new(&fox), &rule).matched);

        let cnn = stream("CNN", None);
        assert!(!evaluator.evaluate(&StreamFacts::new(&cnn), &rule).matched);
    }

    #[test]
    fn negate_flips_result() {
        let registry = TagRegistry::default();
        let evaluator = ConditionEvaluator::new(&registry);
        let rule = rule_with(vec![Condition {
            kind: ConditionType::NameContains("ESPN".to_string()),
            connector: Connector::And,
            negate: true,
        }]);

        let s = stream("CNN", None);
        assert!(evaluator.evaluate(&StreamFacts::new(&s), &rule).matched);
    }

    #[test]
    fn evaluation_never_short_circuits() {
        let registry = TagRegistry::default();
        let evaluator = ConditionEvaluator::new(&registry);
        let rule = rule_with(vec![
            Condition { kind: ConditionType::NameContains("NOPE".to_string()), connector: Connector::And, negate: false },
            Condition { kind: ConditionType::Always, connector: Connector::And, negate: false },
        ]);

        let s = stream("CNN", None);
        let result = evaluator.evaluate(&StreamFacts::new(&s), &rule);
        assert!(!result.matched);
        assert_eq!(result.conditions_log.len(), 2);
        assert!(result.conditions_log[1].matched);
    }

    #[test]
    fn invalid_regex_logs_error_and_does_not_match() {
        let registry = TagRegistry::default();
        let evaluator = ConditionEvaluator::new(&registry);
        let rule = rule_with(vec![Condition {
            kind: ConditionType::NameRegex("(".to_string()),
            connector: Connector::And,
            negate: false,
        }]);

        let s = stream("CNN", None);
        let result = evaluator.evaluate(&StreamFacts::new(&s), &rule);
        assert!(!result.matched);
        assert!(result.conditions_log[0].details.contains("invalid regex"));
    }
}
