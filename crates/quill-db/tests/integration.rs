use chrono::NaiveDate;
use quill_db::{init_schema, query_records, DbSession, Value};
use rusqlite::params;

#[test]
fn init_then_write_then_reopen_round_trip() {
    let file = tempfile::NamedTempFile::new().expect("failed to create temp db");
    let path = file.path().to_path_buf();

    // Administrator path: initialize the schema through a session.
    {
        let mut session = DbSession::new(&path);
        let conn = session.acquire().expect("failed to acquire connection");
        init_schema(conn).expect("failed to initialize schema");

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                     ORDER BY name",
                )
                .expect("failed to prepare table query");
            stmt.query_map([], |row| row.get(0))
                .expect("failed to query tables")
                .map(|r| r.expect("failed to read table name"))
                .collect()
        };
        assert_eq!(tables, vec!["post", "user"]);

        let posts =
            query_records(conn, "SELECT * FROM post", []).expect("failed to query posts");
        assert!(posts.is_empty(), "fresh schema should hold zero rows");
    }

    // Request path: write one row through a new session.
    let written = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(9, 15, 0))
        .expect("valid datetime");
    {
        let mut session = DbSession::new(&path);
        let conn = session.acquire().expect("failed to acquire connection");
        conn.execute(
            "INSERT INTO user (username, password) VALUES ('alice', 'secret')",
            [],
        )
        .expect("failed to insert user");
        conn.execute(
            "INSERT INTO post (author_id, created, title, body)
             VALUES (1, ?1, 'hello', 'first post')",
            params![written],
        )
        .expect("failed to insert post");
    }

    // A later request re-opens and reads the row back as a record.
    let mut session = DbSession::new(&path);
    let conn = session.acquire().expect("failed to acquire connection");
    let records = query_records(
        conn,
        "SELECT id, author_id, created, title FROM post",
        [],
    )
    .expect("failed to query posts");

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.get("title").and_then(Value::as_text), Some("hello"));
    assert_eq!(
        record.get("created").and_then(Value::as_timestamp),
        Some(written),
        "timestamp must come back as a structured value, not raw text"
    );
}
