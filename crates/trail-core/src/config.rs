//! Trail Configuration Management
//!
//! Handles configuration from environment variables and config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Graph store connection
    pub database: DatabaseConfig,

    /// Search defaults
    pub search: SearchConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "API_PORT".to_string(),
                value: port,
            })?;
        }

        // Graph store
        if let Ok(backend) = std::env::var("GRAPH_BACKEND") {
            config.database.backend = backend.parse()?;
        }
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            config.database.surrealdb_url = url;
        }
        if let Ok(user) = std::env::var("SURREALDB_USER") {
            config.database.surrealdb_user = user;
        }
        if let Ok(pass) = std::env::var("SURREALDB_PASS") {
            config.database.surrealdb_pass = pass;
        }
        if let Ok(namespace) = std::env::var("SURREALDB_NAMESPACE") {
            config.database.surrealdb_namespace = namespace;
        }
        if let Ok(database) = std::env::var("SURREALDB_DATABASE") {
            config.database.surrealdb_database = database;
        }

        // CORS origins from environment variable (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            config.logging.json_format = matches!(json.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        // Only override if env values differ from defaults
        if env_config.server.host != ServerConfig::default().host {
            self.server.host = env_config.server.host;
        }
        if env_config.server.port != ServerConfig::default().port {
            self.server.port = env_config.server.port;
        }
        if env_config.database.backend != DatabaseConfig::default().backend {
            self.database.backend = env_config.database.backend;
        }
        if env_config.database.surrealdb_url != DatabaseConfig::default().surrealdb_url {
            self.database.surrealdb_url = env_config.database.surrealdb_url;
        }
        if !env_config.server.cors_origins.is_empty() {
            self.server.cors_origins = env_config.server.cors_origins;
        }
        if std::env::var("SURREALDB_NAMESPACE").is_ok() {
            self.database.surrealdb_namespace = env_config.database.surrealdb_namespace;
        }
        if std::env::var("SURREALDB_DATABASE").is_ok() {
            self.database.surrealdb_database = env_config.database.surrealdb_database;
        }
        if std::env::var("LOG_LEVEL").is_ok() {
            self.logging.level = env_config.logging.level;
        }
        if std::env::var("LOG_JSON").is_ok() {
            self.logging.json_format = env_config.logging.json_format;
        }

        // Always use env for credentials
        if std::env::var("SURREALDB_USER").is_ok() {
            self.database.surrealdb_user = env_config.database.surrealdb_user;
        }
        if std::env::var("SURREALDB_PASS").is_ok() {
            self.database.surrealdb_pass = env_config.database.surrealdb_pass;
        }

        Ok(self)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            max_body_size: 1024 * 1024, // 1MB
            cors_enabled: true,
            // Empty by default - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Graph store engines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    /// Process-local store, lost on restart
    #[default]
    Memory,
    SurrealDb,
}

impl std::str::FromStr for GraphBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "surrealdb" | "surreal" => Ok(Self::SurrealDb),
            _ => Err(ConfigError::InvalidValue {
                key: "GRAPH_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Graph store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Which engine backs the graph
    pub backend: GraphBackend,

    /// SurrealDB WebSocket URL
    pub surrealdb_url: String,

    /// SurrealDB username
    pub surrealdb_user: String,

    /// SurrealDB password
    pub surrealdb_pass: String,

    /// SurrealDB namespace
    pub surrealdb_namespace: String,

    /// SurrealDB database name
    pub surrealdb_database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::Memory,
            surrealdb_url: "ws://localhost:8000".to_string(),
            surrealdb_user: "root".to_string(),
            surrealdb_pass: "root".to_string(),
            surrealdb_namespace: "trail".to_string(),
            surrealdb_database: "browsing".to_string(),
        }
    }
}

/// Defaults applied to search requests that omit them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Range around the open time
    pub default_time_range: i64,

    /// Units of `default_time_range`
    pub default_time_range_units: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_time_range: 30,
            default_time_range_units: "minutes".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<ConfigError> for crate::TrailError {
    fn from(err: ConfigError) -> Self {
        crate::TrailError::ConfigError(err.to_string())
    }
}
