//! Name-addressable row decoding.
//!
//! Query results come back as [`Record`]s whose fields are looked up by
//! column name rather than position. Columns declared `TIMESTAMP` in the
//! schema decode into [`chrono::NaiveDateTime`] instead of raw text, so a
//! stored timestamp round-trips as a structured value.

use chrono::NaiveDateTime;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Params};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while decoding query results.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A database operation failed.
    #[error("record query failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// A TIMESTAMP-declared column held a value chrono could not parse.
    #[error("invalid timestamp value '{value}': {source}")]
    Timestamp {
        /// The raw text that failed to parse.
        value: String,
        /// The underlying chrono parse error.
        source: chrono::ParseError,
    },
}

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A 64-bit integer.
    Integer(i64),
    /// A 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// A binary blob.
    Blob(Vec<u8>),
    /// A decoded `TIMESTAMP` column value.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Returns the integer value, if this is an `Integer`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the text value, if this is a `Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the decoded timestamp, if this is a `Timestamp`.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// One result row with name-addressable fields.
#[derive(Debug, Clone)]
pub struct Record {
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Record {
    /// Looks up a field by column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    /// The column names of this record, in query order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Runs a query and decodes every row into a [`Record`].
///
/// Column declarations are inspected once per statement; any column
/// declared `TIMESTAMP` has its text value decoded into a
/// [`NaiveDateTime`].
///
/// # Errors
///
/// Returns `RecordError::Database` on SQL failure, or
/// `RecordError::Timestamp` if a `TIMESTAMP` column holds unparseable text.
pub fn query_records<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Record>, RecordError> {
    let mut stmt = conn.prepare(sql)?;

    let columns: Arc<Vec<String>> = Arc::new(
        stmt.column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect(),
    );
    let timestamp_column: Vec<bool> = stmt
        .columns()
        .iter()
        .map(|col| {
            col.decl_type()
                .is_some_and(|decl| decl.eq_ignore_ascii_case("timestamp"))
        })
        .collect();

    let mut rows = stmt.query(params)?;
    let mut records = Vec::new();

    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for (idx, is_timestamp) in timestamp_column.iter().enumerate() {
            values.push(decode_value(row.get_ref(idx)?, *is_timestamp)?);
        }
        records.push(Record {
            columns: Arc::clone(&columns),
            values,
        });
    }

    Ok(records)
}

fn decode_value(raw: ValueRef<'_>, timestamp: bool) -> Result<Value, RecordError> {
    Ok(match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if timestamp {
                Value::Timestamp(parse_timestamp(&text)?)
            } else {
                Value::Text(text)
            }
        }
    })
}

/// Parses SQLite's timestamp text forms, with or without the `T` separator
/// and with optional fractional seconds.
fn parse_timestamp(text: &str) -> Result<NaiveDateTime, RecordError> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|source| RecordError::Timestamp {
            value: text.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rusqlite::{params, Connection};

    fn seeded_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        conn.execute_batch(
            "CREATE TABLE event (
                 id INTEGER PRIMARY KEY,
                 label TEXT NOT NULL,
                 at TIMESTAMP NOT NULL
             );",
        )
        .expect("should create table");
        conn
    }

    #[test]
    fn records_are_name_addressable() {
        let conn = seeded_conn();
        conn.execute(
            "INSERT INTO event (label, at) VALUES ('launch', '2024-05-01 12:30:00')",
            [],
        )
        .expect("should insert");

        let records = query_records(&conn, "SELECT id, label, at FROM event", [])
            .expect("query should succeed");
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.columns(), &["id", "label", "at"][..]);
        assert_eq!(record.get("id").and_then(Value::as_integer), Some(1));
        assert_eq!(record.get("label").and_then(Value::as_text), Some("launch"));
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn timestamp_columns_decode_to_datetime() {
        let conn = seeded_conn();
        let written = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(12, 30, 45))
            .expect("valid datetime");
        conn.execute(
            "INSERT INTO event (label, at) VALUES ('launch', ?1)",
            params![written],
        )
        .expect("should insert");

        let records =
            query_records(&conn, "SELECT at FROM event", []).expect("query should succeed");
        let decoded = records[0]
            .get("at")
            .and_then(Value::as_timestamp)
            .expect("at should decode as a timestamp");
        assert_eq!(decoded, written, "timestamp should round-trip structurally");
    }

    #[test]
    fn current_timestamp_default_decodes() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        conn.execute_batch(
            "CREATE TABLE t (at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP);
             INSERT INTO t DEFAULT VALUES;",
        )
        .expect("should create and insert");

        let records = query_records(&conn, "SELECT at FROM t", []).expect("query should succeed");
        assert!(
            records[0].get("at").and_then(Value::as_timestamp).is_some(),
            "CURRENT_TIMESTAMP text should decode into a structured value"
        );
    }

    #[test]
    fn non_timestamp_text_stays_text() {
        let conn = seeded_conn();
        conn.execute(
            "INSERT INTO event (label, at) VALUES ('2024-05-01 12:30:00', '2024-05-01 12:30:00')",
            [],
        )
        .expect("should insert");

        let records = query_records(&conn, "SELECT label, at FROM event", [])
            .expect("query should succeed");
        let record = &records[0];
        assert!(matches!(record.get("label"), Some(Value::Text(_))));
        assert!(matches!(record.get("at"), Some(Value::Timestamp(_))));
    }

    #[test]
    fn garbage_timestamp_reports_error() {
        let conn = seeded_conn();
        conn.execute(
            "INSERT INTO event (label, at) VALUES ('bad', 'not-a-date')",
            [],
        )
        .expect("should insert");

        let err = query_records(&conn, "SELECT at FROM event", [])
            .expect_err("garbage timestamp should fail decoding");
        match err {
            RecordError::Timestamp { value, .. } => assert_eq!(value, "not-a-date"),
            other => panic!("unexpected error type: {other:?}"),
        }
    }
}
