//! The request-scoped database session.
//!
//! A [`DbSession`] is created at the start of a request and dropped at the
//! end of it. The connection inside is opened lazily on the first call to
//! [`DbSession::acquire`]; repeated calls within the same session return
//! the same connection. [`DbSession::release`] closes the connection and
//! clears the slot, and `Drop` guarantees release on every exit path,
//! including panics unwinding out of a handler.

use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Busy timeout applied to every connection, in milliseconds.
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Errors that can occur when opening a session's connection.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The database file could not be opened or configured.
    #[error("failed to open database at {path}: {source}")]
    Open {
        /// Path of the database file that failed to open.
        path: PathBuf,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },
}

/// A per-request database session holding at most one open connection.
///
/// The session starts empty. `acquire` opens the connection on first use
/// and hands back the same handle on every later call. `release` (or drop)
/// closes it. A session may be re-acquired after release, which opens a
/// fresh connection rather than reusing the closed one.
#[derive(Debug)]
pub struct DbSession {
    path: PathBuf,
    conn: Option<Connection>,
}

impl DbSession {
    /// Creates an empty session bound to the given database file path.
    ///
    /// No connection is opened until [`acquire`](Self::acquire) is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
        }
    }

    /// Returns the session's connection, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Open` if the database file cannot be opened
    /// or its connection PRAGMAs cannot be applied. The failure is not
    /// retried; it surfaces to the caller unmodified.
    pub fn acquire(&mut self) -> Result<&mut Connection, SessionError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let conn = open_connection(&self.path)?;
                tracing::debug!(path = %self.path.display(), "opened database connection");
                conn
            }
        };
        Ok(self.conn.insert(conn))
    }

    /// Closes the session's connection, if one is open.
    ///
    /// Calling this with no open connection is a no-op. A close failure is
    /// logged and otherwise swallowed; the connection slot is cleared either
    /// way, so a later `acquire` opens a fresh handle.
    pub fn release(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!(path = %self.path.display(), "closing database connection");
            if let Err((_conn, err)) = conn.close() {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "database connection did not close cleanly"
                );
            }
        }
    }

    /// Returns `true` while the session holds an open connection.
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// The database file path this session is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DbSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Opens a connection with WAL mode, foreign keys, and a busy timeout.
fn open_connection(path: &Path) -> Result<Connection, SessionError> {
    let open_err = |source| SessionError::Open {
        path: path.to_path_buf(),
        source,
    };

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

    let conn = Connection::open_with_flags(path, flags).map_err(open_err)?;

    // Set WAL mode and verify it was accepted. In-memory databases report
    // "memory" which is expected and acceptable.
    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
        .map_err(open_err)?;
    if journal_mode != "wal" && journal_mode != "memory" {
        return Err(open_err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!(
                "failed to set WAL journal mode, got: {}",
                journal_mode
            )),
        )));
    }

    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {};",
        BUSY_TIMEOUT_MS
    ))
    .map_err(open_err)?;

    Ok(conn)
}
