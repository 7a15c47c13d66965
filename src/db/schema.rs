// @generated manually — kept in sync with migrations/ by hand, following the
// table-per-aggregate layout spec.md §6 names.

diesel::table! {
    settings (key) {
        key -> Text,
        value -> Text,
    }
}

diesel::table! {
    rules (id) {
        id -> Integer,
        name -> Text,
        enabled -> Bool,
        priority -> Integer,
        provider_id -> Nullable<Integer>,
        target_group_id -> Nullable<Integer>,
        conditions_json -> Text,
        actions_json -> Text,
        stop_on_first_match -> Bool,
        sort_field -> Nullable<Text>,
        sort_order -> Text,
        starting_channel_number -> Nullable<Integer>,
        probe_on_sort -> Bool,
        normalize_names -> Bool,
        orphan_action -> Text,
        managed_channel_ids_json -> Nullable<Text>,
        match_count -> Integer,
        last_run_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    executions (id) {
        id -> Integer,
        mode -> Text,
        triggered_by -> Text,
        started_at -> Text,
        completed_at -> Nullable<Text>,
        status -> Text,
        streams_evaluated -> Integer,
        streams_matched -> Integer,
        channels_created -> Integer,
        channels_updated -> Integer,
        groups_created -> Integer,
        streams_merged -> Integer,
        streams_skipped -> Integer,
        created_entities_json -> Text,
        modified_entities_json -> Text,
        execution_log_json -> Text,
        dry_run_results_json -> Nullable<Text>,
        rolled_back_at -> Nullable<Text>,
        rolled_back_by -> Nullable<Text>,
    }
}

diesel::table! {
    conflicts (id) {
        id -> Integer,
        execution_id -> Integer,
        stream_id -> BigInt,
        stream_name -> Text,
        winning_rule_id -> Integer,
        losing_rule_ids_json -> Text,
        conflict_type -> Text,
        resolution -> Text,
        description -> Text,
    }
}

diesel::table! {
    stream_stats (stream_id) {
        stream_id -> BigInt,
        stream_name -> Text,
        probe_status -> Text,
        last_probed -> Nullable<Text>,
        resolution -> Nullable<Text>,
        resolution_height -> Nullable<Integer>,
        video_codec -> Nullable<Text>,
        audio_codec -> Nullable<Text>,
        audio_channels -> Nullable<Integer>,
        fps -> Nullable<Float>,
        bitrate -> Nullable<BigInt>,
        video_bitrate -> Nullable<BigInt>,
        stream_type -> Nullable<Text>,
        error_message -> Nullable<Text>,
        consecutive_failures -> Integer,
        dismissed_at -> Nullable<Text>,
    }
}

diesel::table! {
    bandwidth_daily (date) {
        date -> Text,
        bytes_transferred -> BigInt,
        bytes_in -> BigInt,
        bytes_out -> BigInt,
        peak_channels -> Integer,
        peak_clients -> Integer,
        peak_bitrate_in -> BigInt,
        peak_bitrate_out -> BigInt,
    }
}

diesel::table! {
    channel_bandwidth (id) {
        id -> Integer,
        channel_id -> BigInt,
        channel_name -> Text,
        date -> Text,
        bytes_transferred -> BigInt,
        peak_clients -> Integer,
        total_watch_seconds -> BigInt,
        connection_count -> Integer,
    }
}

diesel::table! {
    channel_watch_stats (channel_id) {
        channel_id -> BigInt,
        channel_name -> Text,
        total_watch_seconds_lifetime -> BigInt,
        total_views -> Integer,
        last_watched_at -> Nullable<Text>,
    }
}

diesel::table! {
    unique_client_connections (id) {
        id -> Integer,
        ip_address -> Text,
        channel_id -> BigInt,
        channel_name -> Text,
        date -> Text,
        connected_at -> Text,
        disconnected_at -> Nullable<Text>,
        watch_seconds -> BigInt,
    }
}

diesel::table! {
    tag_groups (id) {
        id -> Integer,
        name -> Text,
    }
}

diesel::table! {
    tags (id) {
        id -> Integer,
        tag_group_id -> Integer,
        value -> Text,
        mode -> Text,
    }
}

diesel::table! {
    normalization_rule_groups (id) {
        id -> Integer,
        name -> Text,
        enabled -> Bool,
        sort_order -> Integer,
    }
}

diesel::table! {
    normalization_rules (id) {
        id -> Integer,
        group_id -> Integer,
        pattern -> Text,
        replacement -> Text,
        is_regex -> Bool,
        sort_order -> Integer,
    }
}

diesel::table! {
    journal_entries (id) {
        id -> Integer,
        occurred_at -> Text,
        event_type -> Text,
        source -> Text,
        source_id -> Nullable<Text>,
        summary -> Text,
        metadata_json -> Nullable<Text>,
    }
}

diesel::joinable!(tags -> tag_groups (tag_group_id));
diesel::joinable!(normalization_rules -> normalization_rule_groups (group_id));
diesel::joinable!(conflicts -> executions (execution_id));

diesel::allow_tables_to_appear_in_same_query!(
    settings,
    rules,
    executions,
    conflicts,
    stream_stats,
    bandwidth_daily,
    channel_bandwidth,
    channel_watch_stats,
    unique_client_connections,
    tag_groups,
    tags,
    normalization_rule_groups,
    normalization_rules,
    journal_entries,
);
