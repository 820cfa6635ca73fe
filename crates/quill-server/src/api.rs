//! API handlers for the Quill server.
//!
//! Every handler follows the same lifecycle: the blocking section creates
//! one [`DbSession`] for the request, acquires its connection as needed,
//! and lets the session drop at the end, which closes the connection on
//! every exit path.

use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use quill_db::{query_records, DbSession, Record, RecordError, SessionError, Value};
use rusqlite::{params, ErrorCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Request body for user creation.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// The unique username.
    pub username: String,
    /// The user's password (stored as given; hashing is out of scope here).
    pub password: String,
}

/// Response body for a created user.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    /// The assigned database ID.
    pub id: i64,
    /// The username.
    pub username: String,
}

/// Request body for post creation.
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    /// The ID of an existing user.
    #[serde(rename = "authorId")]
    pub author_id: i64,
    /// The post title.
    pub title: String,
    /// The post body.
    pub body: String,
}

/// Response body for a post.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    /// The assigned database ID.
    pub id: i64,
    /// The author's user ID.
    #[serde(rename = "authorId")]
    pub author_id: i64,
    /// Creation time in RFC 3339 (UTC).
    pub created: String,
    /// The post title.
    pub title: String,
    /// The post body.
    pub body: String,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        ApiError::InternalServerError(format!("db connection failed: {e}"))
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        ApiError::InternalServerError(format!("db query failed: {e}"))
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation
    )
}

/// Handler for `POST /api/users`.
pub async fn create_user(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if payload.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".into()));
    }

    let user = tokio::task::spawn_blocking(move || -> Result<UserResponse, ApiError> {
        let mut session = DbSession::new(&*state.db_path);
        let conn = session.acquire()?;

        conn.execute(
            "INSERT INTO user (username, password) VALUES (?1, ?2)",
            params![payload.username, payload.password],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ApiError::Conflict(format!("username '{}' is already taken", payload.username))
            } else {
                ApiError::InternalServerError(format!("failed to insert user: {e}"))
            }
        })?;

        Ok(UserResponse {
            id: conn.last_insert_rowid(),
            username: payload.username,
        })
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("blocking task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Handler for `POST /api/posts`.
///
/// Inserts the post, then re-acquires the session's connection to read the
/// stored row back, so the response carries the database-assigned creation
/// timestamp.
pub async fn create_post(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }

    let post = tokio::task::spawn_blocking(move || -> Result<PostResponse, ApiError> {
        let mut session = DbSession::new(&*state.db_path);

        let conn = session.acquire()?;
        conn.execute(
            "INSERT INTO post (author_id, title, body) VALUES (?1, ?2, ?3)",
            params![payload.author_id, payload.title, payload.body],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ApiError::BadRequest(format!("author {} does not exist", payload.author_id))
            } else {
                ApiError::InternalServerError(format!("failed to insert post: {e}"))
            }
        })?;
        let id = conn.last_insert_rowid();

        // Second acquire within the same request: returns the connection
        // opened above, not a new one.
        let conn = session.acquire()?;
        let records = query_records(
            conn,
            "SELECT id, author_id, created, title, body FROM post WHERE id = ?1",
            params![id],
        )?;
        let record = records
            .first()
            .ok_or_else(|| ApiError::InternalServerError("inserted post not found".into()))?;

        post_from_record(record)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("blocking task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(post)))
}

/// Handler for `GET /api/posts`.
pub async fn list_posts(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let posts = tokio::task::spawn_blocking(move || -> Result<Vec<PostResponse>, ApiError> {
        let mut session = DbSession::new(&*state.db_path);
        let conn = session.acquire()?;

        let records = query_records(
            conn,
            "SELECT id, author_id, created, title, body FROM post
             ORDER BY created DESC, id DESC",
            [],
        )?;

        records.iter().map(post_from_record).collect()
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("blocking task failed: {e}")))??;

    Ok(Json(posts))
}

/// Maps a `post` row record into the API response shape.
fn post_from_record(record: &Record) -> Result<PostResponse, ApiError> {
    let field = |name: &str| {
        record
            .get(name)
            .ok_or_else(|| ApiError::InternalServerError(format!("post row missing '{name}'")))
    };

    let integer = |name: &str| {
        field(name)?
            .as_integer()
            .ok_or_else(|| ApiError::InternalServerError(format!("post '{name}' is not an integer")))
    };
    let text = |name: &str| {
        Ok::<_, ApiError>(
            field(name)?
                .as_text()
                .ok_or_else(|| ApiError::InternalServerError(format!("post '{name}' is not text")))?
                .to_string(),
        )
    };

    let created = match field("created")? {
        Value::Timestamp(ts) => ts.and_utc().to_rfc3339(),
        other => {
            return Err(ApiError::InternalServerError(format!(
                "post 'created' did not decode as a timestamp: {other:?}"
            )))
        }
    };

    Ok(PostResponse {
        id: integer("id")?,
        author_id: integer("author_id")?,
        created,
        title: text("title")?,
        body: text("body")?,
    })
}
