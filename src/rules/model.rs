//! Rule, Condition, and Action domain types.
//!
//! These are the in-memory shapes the engine and evaluator work with;
//! [`super::super::db::models::Rule`] is the flat row they're
//! (de)serialized to/from via `conditions_json`/`actions_json`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connector {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ConditionType {
    NameContains(String),
    NameRegex(String),
    GroupEquals(String),
    TagIn(String),
    TvgPresent,
    ResolutionGe(u32),
    Always,
    /// An unrecognized condition type kept verbatim so old rules
    /// round-trip through storage even if a type was retired; it never
    /// matches and is logged as an evaluation error.
    Unknown(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    #[serde(flatten)]
    pub kind: ConditionType,
    #[serde(default = "default_connector")]
    pub connector: Connector,
    #[serde(default)]
    pub negate: bool,
}

fn default_connector() -> Connector {
    Connector::And
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IfExists {
    Skip,
    Merge,
    MergeOnly,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupIfExists {
    UseExisting,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindChannelBy {
    NameExact,
    NameRegex,
    TvgId,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetVariableMode {
    Literal,
    RegexExtract,
    RegexReplace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelParams {
    pub name_template: String,
    pub if_exists: IfExists,
    pub name_transform_pattern: Option<String>,
    pub name_transform_replacement: Option<String>,
    pub channel_number: String,
    pub number_prefix_in_name: bool,
    pub default_profile_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupParams {
    pub name_template: String,
    pub if_exists: GroupIfExists,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeStreamsParams {
    pub find_channel_by: FindChannelBy,
    pub find_channel_value: String,
    pub max_streams_per_channel: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetVariableParams {
    pub var_name: String,
    pub mode: SetVariableMode,
    pub source_field: Option<String>,
    pub pattern: Option<String>,
    pub replacement: Option<String>,
    pub template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "params")]
pub enum Action {
    CreateChannel(CreateChannelParams),
    CreateGroup(CreateGroupParams),
    MergeStreams(MergeStreamsParams),
    AssignLogo { from_stream: bool, url: Option<String> },
    AssignTvgId { value: Option<String>, from_stream: bool },
    AssignEpg { source_id: i64 },
    AssignProfile { profile_ids: Vec<i64> },
    SetChannelNumber { number: String },
    SetVariable(SetVariableParams),
    Skip,
    StopProcessing,
    LogMatch { message: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanAction {
    Delete,
    MoveUncategorized,
    DeleteAndCleanupGroups,
    None,
}

/// The in-memory form of a [`crate::db::models::Rule`] row, with
/// `conditions`/`actions`/`managed_channel_ids` deserialized out of their
/// JSON columns.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: i32,
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub provider_id: Option<i32>,
    pub target_group_id: Option<i32>,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub stop_on_first_match: bool,
    pub sort_field: Option<String>,
    pub sort_order: SortOrder,
    /// Pass 3's renumber floor (spec.md §4.3). `None` means the rule has
    /// no configured starting number, in which case Pass 3 skips
    /// renumbering entirely rather than inventing one.
    pub starting_channel_number: Option<i32>,
    pub probe_on_sort: bool,
    pub normalize_names: bool,
    pub orphan_action: OrphanAction,
    pub managed_channel_ids: Option<Vec<i64>>,
    pub match_count: i32,
    pub last_run_at: Option<String>,
}

impl OrphanAction {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "delete" => Self::Delete,
            "move_uncategorized" => Self::MoveUncategorized,
            "delete_and_cleanup_groups" => Self::DeleteAndCleanupGroups,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::MoveUncategorized => "move_uncategorized",
            Self::DeleteAndCleanupGroups => "delete_and_cleanup_groups",
            Self::None => "none",
        }
    }
}

impl SortOrder {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl Rule {
    pub fn from_row(row: crate::db::models::Rule) -> Result<Self, serde_json::Error> {
        let conditions: Vec<Condition> = serde_json::from_str(&row.conditions_json)?;
        let actions: Vec<Action> = serde_json::from_str(&row.actions_json)?;
        let managed_channel_ids = row
            .managed_channel_ids_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Self {
            id: row.id,
            name: row.name,
            enabled: row.enabled,
            priority: row.priority,
            provider_id: row.provider_id,
            target_group_id: row.target_group_id,
            conditions,
            actions,
            stop_on_first_match: row.stop_on_first_match,
            sort_field: row.sort_field,
            sort_order: SortOrder::parse(&row.sort_order),
            starting_channel_number: row.starting_channel_number,
            probe_on_sort: row.probe_on_sort,
            normalize_names: row.normalize_names,
            orphan_action: OrphanAction::parse(&row.orphan_action),
            managed_channel_ids,
            match_count: row.match_count,
            last_run_at: row.last_run_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_round_trips_through_json() {
        let condition = Condition {
            kind: ConditionType::NameContains("ESPN".to_string()),
            connector: Connector::Or,
            negate: true,
        };
        let json = serde_json::to_string(&condition).unwrap();
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ConditionType::NameContains("ESPN".to_string()));
        assert_eq!(back.connector, Connector::Or);
        assert!(back.negate);
    }

    #[test]
    fn action_round_trips_through_json() {
        let action = Action::AssignLogo { from_stream: true, url: None };
        let json = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&json).unwrap();
        matches!(back, Action::AssignLogo { from_stream: true, url: None });
        let _ = json;
    }

    #[test]
    fn orphan_action_round_trips_through_str() {
        for action in [
            OrphanAction::Delete,
            OrphanAction::MoveUncategorized,
            OrphanAction::DeleteAndCleanupGroups,
            OrphanAction::None,
        ] {
            assert_eq!(OrphanAction::parse(action.as_str()).as_str(), action.as_str());
        }
    }
}
