//! Row structs for every table in [`super::schema`].
//!
//! Nested or variable-shape data (rule conditions/actions, execution
//! logs, managed-channel-id lists) is stored as a `Text` JSON column and
//! deserialized by the owning domain module (`rules`, `engine`) rather
//! than here — these structs stay a flat mirror of the schema so diesel's
//! derives keep working without a custom `FromSql` per column.

use diesel::prelude::*;

use crate::db::schema::{
    bandwidth_daily, channel_bandwidth, channel_watch_stats, conflicts, executions,
    journal_entries, normalization_rule_groups, normalization_rules, rules, settings,
    stream_stats, tag_groups, tags, unique_client_connections,
};

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = settings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Setting {
    pub key: String,
    pub value: String,
}

impl Setting {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = rules)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Rule {
    pub id: i32,
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub provider_id: Option<i32>,
    pub target_group_id: Option<i32>,
    pub conditions_json: String,
    pub actions_json: String,
    pub stop_on_first_match: bool,
    pub sort_field: Option<String>,
    pub sort_order: String,
    pub starting_channel_number: Option<i32>,
    pub probe_on_sort: bool,
    pub normalize_names: bool,
    pub orphan_action: String,
    pub managed_channel_ids_json: Option<String>,
    pub match_count: i32,
    pub last_run_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = rules)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewRule {
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub provider_id: Option<i32>,
    pub target_group_id: Option<i32>,
    pub conditions_json: String,
    pub actions_json: String,
    pub stop_on_first_match: bool,
    pub sort_field: Option<String>,
    pub sort_order: String,
    pub starting_channel_number: Option<i32>,
    pub probe_on_sort: bool,
    pub normalize_names: bool,
    pub orphan_action: String,
    pub managed_channel_ids_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = rules)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
    pub provider_id: Option<Option<i32>>,
    pub target_group_id: Option<Option<i32>>,
    pub conditions_json: Option<String>,
    pub actions_json: Option<String>,
    pub stop_on_first_match: Option<bool>,
    pub sort_field: Option<Option<String>>,
    pub sort_order: Option<String>,
    pub starting_channel_number: Option<Option<i32>>,
    pub probe_on_sort: Option<bool>,
    pub normalize_names: Option<bool>,
    pub orphan_action: Option<String>,
    pub managed_channel_ids_json: Option<Option<String>>,
    pub updated_at: Option<String>,
}

#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = rules)]
pub struct RuleRunStats {
    pub match_count: Option<i32>,
    pub last_run_at: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = executions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Execution {
    pub id: i32,
    pub mode: String,
    pub triggered_by: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub streams_evaluated: i32,
    pub streams_matched: i32,
    pub channels_created: i32,
    pub channels_updated: i32,
    pub groups_created: i32,
    pub streams_merged: i32,
    pub streams_skipped: i32,
    pub created_entities_json: String,
    pub modified_entities_json: String,
    pub execution_log_json: String,
    pub dry_run_results_json: Option<String>,
    pub rolled_back_at: Option<String>,
    pub rolled_back_by: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = executions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewExecution {
    pub mode: String,
    pub triggered_by: String,
    pub started_at: String,
    pub status: String,
    pub created_entities_json: String,
    pub modified_entities_json: String,
    pub execution_log_json: String,
}

#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = executions)]
pub struct ExecutionCompletion {
    pub completed_at: Option<String>,
    pub status: Option<String>,
    pub streams_evaluated: Option<i32>,
    pub streams_matched: Option<i32>,
    pub channels_created: Option<i32>,
    pub channels_updated: Option<i32>,
    pub groups_created: Option<i32>,
    pub streams_merged: Option<i32>,
    pub streams_skipped: Option<i32>,
    pub created_entities_json: Option<String>,
    pub modified_entities_json: Option<String>,
    pub execution_log_json: Option<String>,
    pub dry_run_results_json: Option<Option<String>>,
}

#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = executions)]
pub struct ExecutionRollback {
    pub rolled_back_at: Option<String>,
    pub rolled_back_by: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = conflicts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Conflict {
    pub id: i32,
    pub execution_id: i32,
    pub stream_id: i64,
    pub stream_name: String,
    pub winning_rule_id: i32,
    pub losing_rule_ids_json: String,
    pub conflict_type: String,
    pub resolution: String,
    pub description: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = conflicts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewConflict {
    pub execution_id: i32,
    pub stream_id: i64,
    pub stream_name: String,
    pub winning_rule_id: i32,
    pub losing_rule_ids_json: String,
    pub conflict_type: String,
    pub resolution: String,
    pub description: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = stream_stats)]
#[diesel(primary_key(stream_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StreamStats {
    pub stream_id: i64,
    pub stream_name: String,
    pub probe_status: String,
    pub last_probed: Option<String>,
    pub resolution: Option<String>,
    pub resolution_height: Option<i32>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<i32>,
    pub fps: Option<f32>,
    pub bitrate: Option<i64>,
    pub video_bitrate: Option<i64>,
    pub stream_type: Option<String>,
    pub error_message: Option<String>,
    pub consecutive_failures: i32,
    pub dismissed_at: Option<String>,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = stream_stats)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StreamStatsUpsert {
    pub stream_id: i64,
    pub stream_name: String,
    pub probe_status: String,
    pub last_probed: Option<String>,
    pub resolution: Option<String>,
    pub resolution_height: Option<i32>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<i32>,
    pub fps: Option<f32>,
    pub bitrate: Option<i64>,
    pub video_bitrate: Option<i64>,
    pub stream_type: Option<String>,
    pub error_message: Option<String>,
    pub consecutive_failures: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = bandwidth_daily)]
#[diesel(primary_key(date))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BandwidthDaily {
    pub date: String,
    pub bytes_transferred: i64,
    pub bytes_in: i64,
    pub bytes_out: i64,
    pub peak_channels: i32,
    pub peak_clients: i32,
    pub peak_bitrate_in: i64,
    pub peak_bitrate_out: i64,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = bandwidth_daily)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BandwidthDailyUpsert {
    pub date: String,
    pub bytes_transferred: i64,
    pub bytes_in: i64,
    pub bytes_out: i64,
    pub peak_channels: i32,
    pub peak_clients: i32,
    pub peak_bitrate_in: i64,
    pub peak_bitrate_out: i64,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = channel_bandwidth)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChannelBandwidth {
    pub id: i32,
    pub channel_id: i64,
    pub channel_name: String,
    pub date: String,
    pub bytes_transferred: i64,
    pub peak_clients: i32,
    pub total_watch_seconds: i64,
    pub connection_count: i32,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = channel_bandwidth)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewChannelBandwidth {
    pub channel_id: i64,
    pub channel_name: String,
    pub date: String,
    pub bytes_transferred: i64,
    pub peak_clients: i32,
    pub total_watch_seconds: i64,
    pub connection_count: i32,
}

#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = channel_bandwidth)]
pub struct ChannelBandwidthUpdate {
    pub bytes_transferred: Option<i64>,
    pub peak_clients: Option<i32>,
    pub total_watch_seconds: Option<i64>,
    pub connection_count: Option<i32>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = channel_watch_stats)]
#[diesel(primary_key(channel_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChannelWatchStats {
    pub channel_id: i64,
    pub channel_name: String,
    pub total_watch_seconds_lifetime: i64,
    pub total_views: i32,
    pub last_watched_at: Option<String>,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = channel_watch_stats)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChannelWatchStatsUpsert {
    pub channel_id: i64,
    pub channel_name: String,
    pub total_watch_seconds_lifetime: i64,
    pub total_views: i32,
    pub last_watched_at: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = unique_client_connections)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UniqueClientConnection {
    pub id: i32,
    pub ip_address: String,
    pub channel_id: i64,
    pub channel_name: String,
    pub date: String,
    pub connected_at: String,
    pub disconnected_at: Option<String>,
    pub watch_seconds: i64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = unique_client_connections)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewUniqueClientConnection {
    pub ip_address: String,
    pub channel_id: i64,
    pub channel_name: String,
    pub date: String,
    pub connected_at: String,
    pub watch_seconds: i64,
}

#[derive(AsChangeset, Debug, Clone, Default)]
#[diesel(table_name = unique_client_connections)]
pub struct UniqueClientConnectionUpdate {
    pub disconnected_at: Option<Option<String>>,
    pub watch_seconds: Option<i64>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = tag_groups)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TagGroup {
    pub id: i32,
    pub name: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = tag_groups)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewTagGroup {
    pub name: String,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(belongs_to(TagGroup))]
#[diesel(table_name = tags)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Tag {
    pub id: i32,
    pub tag_group_id: i32,
    pub value: String,
    pub mode: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = tags)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewTag {
    pub tag_group_id: i32,
    pub value: String,
    pub mode: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = normalization_rule_groups)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NormalizationRuleGroup {
    pub id: i32,
    pub name: String,
    pub enabled: bool,
    pub sort_order: i32,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = normalization_rule_groups)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewNormalizationRuleGroup {
    pub name: String,
    pub enabled: bool,
    pub sort_order: i32,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(belongs_to(NormalizationRuleGroup, foreign_key = group_id))]
#[diesel(table_name = normalization_rules)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NormalizationRuleRow {
    pub id: i32,
    pub group_id: i32,
    pub pattern: String,
    pub replacement: String,
    pub is_regex: bool,
    pub sort_order: i32,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = normalization_rules)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewNormalizationRuleRow {
    pub group_id: i32,
    pub pattern: String,
    pub replacement: String,
    pub is_regex: bool,
    pub sort_order: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = journal_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JournalEntry {
    pub id: i32,
    pub occurred_at: String,
    pub event_type: String,
    pub source: String,
    pub source_id: Option<String>,
    pub summary: String,
    pub metadata_json: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = journal_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewJournalEntry {
    pub occurred_at: String,
    pub event_type: String,
    pub source: String,
    pub source_id: Option<String>,
    pub summary: String,
    pub metadata_json: Option<String>,
}
