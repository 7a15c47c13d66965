//! Idempotent additive schema migrations.
//!
//! [`super::connection::run_migrations`] handles the embedded up/down
//! migrations that create tables. This module handles the other kind of
//! schema change spec.md §6 describes: columns added to an existing table by
//! a newer binary running against an older database file. Each entry is a
//! "does this column exist? if not, add it" check run at startup, so the
//! same binary can start cleanly against a fresh database (where the column
//! already exists from the embedded migration) or an old one (where it
//! doesn't yet).

use diesel::sqlite::SqliteConnection;
use diesel::{QueryableByName, RunQueryDsl};
use diesel::sql_types::Text;

/// One additive column this binary expects to exist.
struct ColumnSpec {
    table: &'static str,
    column: &'static str,
    ddl_type: &'static str,
    default_sql: &'static str,
}

/// The manifest of additive columns. New entries are appended here as the
/// schema grows; existing entries are never removed, so a sufficiently old
/// database is brought forward in one pass regardless of how many releases
/// it skipped.
const ADDITIVE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        table: "stream_stats",
        column: "resolution_height",
        ddl_type: "INTEGER",
        default_sql: "NULL",
    },
    ColumnSpec {
        table: "rules",
        column: "match_count",
        ddl_type: "INTEGER",
        default_sql: "0",
    },
];

// `PRAGMA table_info` returns several columns; we only need `name`, and
// diesel's `QueryableByName` maps result columns positionally by name match.
#[derive(QueryableByName)]
struct ColumnName {
    #[diesel(sql_type = Text)]
    name: String,
}

fn table_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<String>, diesel::result::Error> {
    // PRAGMA statements can't be parameterized; `table` always comes from
    // the compiled-in manifest above, never from user input.
    let query = format!("PRAGMA table_info({table})");
    let rows: Vec<ColumnName> = diesel::sql_query(query).load(conn)?;
    Ok(rows.into_iter().map(|c| c.name).collect())
}

/// Run the additive-column pass. Safe to call on every startup.
pub fn apply_additive(conn: &mut SqliteConnection) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    for spec in ADDITIVE_COLUMNS {
        let existing = table_columns(conn, spec.table)?;
        if existing.iter().any(|c| c == spec.column) {
            continue;
        }
        let ddl = format!(
            "ALTER TABLE {} ADD COLUMN {} {} DEFAULT {}",
            spec.table, spec.column, spec.ddl_type, spec.default_sql
        );
        diesel::sql_query(ddl).execute(conn)?;
        tracing::info!(table = spec.table, column = spec.column, "added column via additive migration");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::connection::SimpleConnection;
    use diesel::Connection;

    fn memory_conn() -> SqliteConnection {
        SqliteConnection::establish(":memory:").unwrap()
    }

    #[test]
    fn adds_missing_column() {
        let mut conn = memory_conn();
        conn.batch_execute("CREATE TABLE stream_stats (stream_id BIGINT PRIMARY KEY, stream_name TEXT)")
            .unwrap();

        apply_additive(&mut conn).unwrap();

        let cols = table_columns(&mut conn, "stream_stats").unwrap();
        assert!(cols.iter().any(|c| c == "resolution_height"));
    }

    #[test]
    fn is_idempotent() {
        let mut conn = memory_conn();
        conn.batch_execute("CREATE TABLE stream_stats (stream_id BIGINT PRIMARY KEY, stream_name TEXT)")
            .unwrap();

        apply_additive(&mut conn).unwrap();
        apply_additive(&mut conn).unwrap();

        let cols = table_columns(&mut conn, "stream_stats").unwrap();
        assert_eq!(cols.iter().filter(|c| *c == "resolution_height").count(), 1);
    }
}
