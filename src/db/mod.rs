pub mod connection;
pub mod migrations;
pub mod models;
pub mod schema;

pub use connection::{establish_connection, resolve_db_path, DbConnection, DbPool, DbPooledConnection};
