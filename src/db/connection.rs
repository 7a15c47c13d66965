use std::path::{Path, PathBuf};

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbPooledConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Owns the connection pool used by every repository in [`crate::db`].
#[derive(Clone)]
pub struct DbConnection {
    pool: DbPool,
}

impl DbConnection {
    /// Build a connection pool against `database_url` (a SQLite file path or
    /// `:memory:`), running embedded migrations first.
    pub fn new(database_url: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(16)
            .build(manager)
            .map_err(|e| format!("failed to create connection pool: {e}"))?;

        {
            let mut conn = pool
                .get()
                .map_err(|e| format!("failed to get connection from pool: {e}"))?;
            run_migrations(&mut conn)?;
            migrations::apply_additive(&mut conn)?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }

    pub fn get(&self) -> Result<DbPooledConnection, r2d2::Error> {
        self.pool.get()
    }
}

use crate::db::migrations;

/// Resolve the SQLite database path under `CONFIG_DIR`, creating the
/// directory if necessary.
pub fn resolve_db_path(config_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(config_dir)?;
    Ok(config_dir.join("journal.db"))
}

/// Establish a single connection with a busy timeout suitable for
/// concurrent access from multiple background tasks.
pub fn establish_connection(database_url: &str) -> Result<SqliteConnection, diesel::ConnectionError> {
    let mut conn = SqliteConnection::establish(database_url)?;
    diesel::sql_query("PRAGMA busy_timeout = 5000")
        .execute(&mut conn)
        .map_err(|e| diesel::ConnectionError::BadConnection(format!("failed to set busy_timeout: {e}")))?;
    diesel::sql_query("PRAGMA foreign_keys = ON")
        .execute(&mut conn)
        .map_err(|e| diesel::ConnectionError::BadConnection(format!("failed to enable foreign_keys: {e}")))?;
    Ok(conn)
}

/// Run all pending embedded migrations (table creation).
pub fn run_migrations(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}
