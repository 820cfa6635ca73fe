//! Quill server library logic.

pub mod api;
pub mod config;

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
///
/// There is deliberately no connection pool here: each request opens its
/// own [`quill_db::DbSession`] against `db_path` and drops it when the
/// request ends.
#[derive(Clone)]
pub struct AppState {
    /// Path to the SQLite database file.
    pub db_path: Arc<str>,
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version. Used by load balancers,
/// monitoring, and CI to verify the server is running.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", post(api::create_user))
        .route("/api/posts", post(api::create_post).get(api::list_posts))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
