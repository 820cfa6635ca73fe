//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
///
/// `path` is the one required key: startup fails unless it is supplied by
/// the config file or by `QUILL_DB_PATH`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "quill_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Returns the configured database path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingDatabasePath` when neither the config
    /// file nor the environment supplied one.
    pub fn database_path(&self) -> Result<&str, ConfigError> {
        self.database
            .path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(ConfigError::MissingDatabasePath)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// No database path was configured.
    #[error("database.path is required (set it in the config file or via QUILL_DB_PATH)")]
    MissingDatabasePath,
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `QUILL_HOST` overrides `server.host`
/// - `QUILL_PORT` overrides `server.port`
/// - `QUILL_DB_PATH` overrides `database.path`
/// - `QUILL_LOG_LEVEL` overrides `logging.level`
/// - `QUILL_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("QUILL_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("QUILL_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("QUILL_DB_PATH") {
        config.database.path = Some(db_path);
    }
    if let Ok(level) = std::env::var("QUILL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("QUILL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [database]
            path = "/var/lib/quill/quill.db"

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.database_path().expect("path should be present"),
            "/var/lib/quill/quill.db"
        );
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn missing_database_path_is_an_error() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        let err = config
            .database_path()
            .expect_err("missing path should be rejected");
        assert!(matches!(err, ConfigError::MissingDatabasePath));
    }

    #[test]
    fn blank_database_path_is_an_error() {
        let config: Config = toml::from_str("[database]\npath = \"  \"\n")
            .expect("config should parse");
        assert!(matches!(
            config.database_path(),
            Err(ConfigError::MissingDatabasePath)
        ));
    }
}
