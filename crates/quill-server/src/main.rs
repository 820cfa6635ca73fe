//! Quill server binary.
//!
//! Starts an axum HTTP server with structured logging and graceful shutdown
//! on SIGTERM/SIGINT, or — with the `init-db` subcommand — destructively
//! initializes the database schema and exits.

use quill_db::DbSession;
use quill_server::{app, config, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// What the binary was asked to do.
enum Command {
    /// Run the HTTP server (the default).
    Serve,
    /// Reset the database schema and exit.
    InitDb,
}

fn resolve_cli() -> (Command, Option<String>, &'static str) {
    let mut args = std::env::args().skip(1).filter(|a| !a.trim().is_empty());

    let (command, path_arg) = match args.next() {
        Some(arg) if arg == "init-db" => (Command::InitDb, args.next()),
        other => (Command::Serve, other),
    };

    if let Some(path) = path_arg {
        return (command, Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("QUILL_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (command, Some(path), "env-var");
        }
    }

    (command, None, "default")
}

#[tokio::main]
async fn main() {
    let (command, resolved_config_path, config_source) = resolve_cli();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let db_path = config
        .database_path()
        .expect("no database configured — set database.path in config or QUILL_DB_PATH");

    if let Command::InitDb = command {
        init_db(db_path);
        return;
    }

    // Fail fast on an unusable database path; the probe session closes
    // immediately. The schema script is never run here — serving must not
    // wipe data.
    {
        let mut session = DbSession::new(db_path);
        session
            .acquire()
            .expect("failed to open database — check database.path in config");
    }

    // Build application
    let state = AppState {
        db_path: Arc::from(db_path),
    };
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting quill server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("quill server shut down");
}

/// Clears the existing data and creates new tables, then prints the
/// confirmation message. Any failure panics, so the process exits non-zero.
fn init_db(db_path: &str) {
    let mut session = DbSession::new(db_path);
    let conn = session
        .acquire()
        .expect("failed to open database — check database.path in config");
    quill_db::init_schema(conn).expect("failed to initialize database schema");

    println!("Initialized the database.");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
