//! One-shot schema initialization.
//!
//! The schema is a single SQL script embedded at compile time. It is
//! destructive: every run drops and recreates the blog tables. It is only
//! ever executed through the administrator-invoked `init-db` command,
//! never during normal serving.

use rusqlite::Connection;
use thiserror::Error;

/// The embedded schema script.
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Errors that can occur while executing the schema script.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A statement in the schema script failed.
    #[error("schema script failed: {0}")]
    Execution(#[from] rusqlite::Error),
}

/// Executes the embedded schema script against the given connection.
///
/// Statements run in sequence; there is no rollback on partial failure.
///
/// # Errors
///
/// Returns `SchemaError::Execution` with the underlying SQLite error if
/// any statement fails.
pub fn init_schema(conn: &Connection) -> Result<(), SchemaError> {
    tracing::info!("initializing database schema");
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
