//! Diesel-backed repositories for the auto-creation pipeline's own tables.
//!
//! One struct per aggregate, hand-written query functions rather than a
//! query-builder abstraction layered on top of diesel — matching the
//! teacher's `db::models` + free functions style rather than introducing
//! a repository trait hierarchy.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use std::collections::HashMap;

use crate::db::models::{
    Conflict, Execution, ExecutionCompletion, ExecutionRollback, NewConflict, NewExecution, Rule as RuleRow,
    RuleRunStats, RuleUpdate, StreamStats, StreamStatsUpsert,
};
use crate::db::schema::{conflicts, executions, rules, stream_stats};

pub struct RuleRepo;

impl RuleRepo {
    pub fn list_enabled(
        conn: &mut SqliteConnection,
        provider_id: Option<i32>,
        rule_id: Option<i32>,
    ) -> QueryResult<Vec<RuleRow>> {
        let mut query = rules::table.filter(rules::enabled.eq(true)).into_boxed();
        if let Some(id) = rule_id {
            query = query.filter(rules::id.eq(id));
        }
        if let Some(provider_id) = provider_id {
            query = query.filter(rules::provider_id.eq(provider_id).or(rules::provider_id.is_null()));
        }
        query.order(rules::priority.asc()).load(conn)
    }

    pub fn record_run(conn: &mut SqliteConnection, rule_id: i32, match_count: i32, last_run_at: &str) -> QueryResult<()> {
        diesel::update(rules::table.filter(rules::id.eq(rule_id)))
            .set(&RuleRunStats { match_count: Some(match_count), last_run_at: Some(last_run_at.to_string()) })
            .execute(conn)?;
        Ok(())
    }

    pub fn update_managed_channel_ids(conn: &mut SqliteConnection, rule_id: i32, ids_json: &str) -> QueryResult<()> {
        diesel::update(rules::table.filter(rules::id.eq(rule_id)))
            .set(&RuleUpdate { managed_channel_ids_json: Some(Some(ids_json.to_string())), ..Default::default() })
            .execute(conn)?;
        Ok(())
    }
}

pub struct ExecutionRepo;

impl ExecutionRepo {
    pub fn start(conn: &mut SqliteConnection, new_execution: NewExecution) -> QueryResult<Execution> {
        diesel::insert_into(executions::table).values(&new_execution).execute(conn)?;
        executions::table.order(executions::id.desc()).first(conn)
    }

    pub fn complete(conn: &mut SqliteConnection, execution_id: i32, completion: ExecutionCompletion) -> QueryResult<Execution> {
        diesel::update(executions::table.filter(executions::id.eq(execution_id)))
            .set(&completion)
            .execute(conn)?;
        executions::table.filter(executions::id.eq(execution_id)).first(conn)
    }

    pub fn get(conn: &mut SqliteConnection, execution_id: i32) -> QueryResult<Execution> {
        executions::table.filter(executions::id.eq(execution_id)).first(conn)
    }

    pub fn mark_rolled_back(conn: &mut SqliteConnection, execution_id: i32, rollback: ExecutionRollback) -> QueryResult<Execution> {
        diesel::update(executions::table.filter(executions::id.eq(execution_id)))
            .set(&rollback)
            .execute(conn)?;
        executions::table.filter(executions::id.eq(execution_id)).first(conn)
    }
}

pub struct ConflictRepo;

impl ConflictRepo {
    pub fn record(conn: &mut SqliteConnection, conflict: NewConflict) -> QueryResult<()> {
        diesel::insert_into(conflicts::table).values(&conflict).execute(conn)?;
        Ok(())
    }

    pub fn list_for_execution(conn: &mut SqliteConnection, execution_id: i32) -> QueryResult<Vec<Conflict>> {
        conflicts::table.filter(conflicts::execution_id.eq(execution_id)).load(conn)
    }
}

pub struct StatsRepo;

impl StatsRepo {
    /// Load every stream's last successful probe, keyed by stream id, for
    /// the pipeline's initial snapshot.
    pub fn load_success_map(conn: &mut SqliteConnection) -> QueryResult<HashMap<i64, StreamStats>> {
        let rows: Vec<StreamStats> = stream_stats::table.filter(stream_stats::probe_status.eq("success")).load(conn)?;
        Ok(rows.into_iter().map(|row| (row.stream_id, row)).collect())
    }

    /// Inserts or replaces a stream's probe result, keeping
    /// `consecutive_failures` the caller already computed.
    pub fn upsert(conn: &mut SqliteConnection, row: StreamStatsUpsert) -> QueryResult<()> {
        diesel::insert_into(stream_stats::table)
            .values(&row)
            .on_conflict(stream_stats::stream_id)
            .do_update()
            .set(&row)
            .execute(conn)?;
        Ok(())
    }

    pub fn load_all(conn: &mut SqliteConnection) -> QueryResult<Vec<StreamStats>> {
        stream_stats::table.load(conn)
    }

    pub fn get(conn: &mut SqliteConnection, stream_id_val: i64) -> QueryResult<Option<StreamStats>> {
        stream_stats::table
            .filter(stream_stats::stream_id.eq(stream_id_val))
            .first(conn)
            .optional()
    }

    pub fn dismiss(conn: &mut SqliteConnection, stream_id_val: i64, dismissed_at_val: &str) -> QueryResult<()> {
        diesel::update(stream_stats::table.filter(stream_stats::stream_id.eq(stream_id_val)))
            .set(stream_stats::dismissed_at.eq(Some(dismissed_at_val.to_string())))
            .execute(conn)?;
        Ok(())
    }
}
