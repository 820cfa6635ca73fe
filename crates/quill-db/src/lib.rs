//! Database layer for the Quill blog service.
//!
//! Provides the request-scoped SQLite session, one-shot schema
//! initialization, and name-addressable row decoding. Every handler in the
//! Quill server opens at most one database connection per request through
//! this crate, and that connection is closed when the request ends.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process required; WAL
//!   allows concurrent readers with a single writer, which matches the
//!   one-connection-per-request access pattern.
//! - **Per-request sessions instead of a pool**: each request owns exactly
//!   one connection for its whole lifetime and drops it at the end. File
//!   level coordination between concurrent requests is left entirely to
//!   SQLite's own locking.
//! - **Embedded schema script**: the schema SQL is compiled into the binary
//!   via `include_str!`, so the `init-db` command works wherever the binary
//!   is deployed.

mod record;
mod schema;
mod session;

pub use record::{query_records, Record, RecordError, Value};
pub use schema::{init_schema, SchemaError, SCHEMA_SQL};
pub use session::{DbSession, SessionError};
