/// Configuration management for the taskhub backend
///
/// Handles server binding, database location, blob storage root, the
/// comment-type seed file and the orphan sweep schedule.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Attachment blob storage configuration
    pub storage: StorageConfig,
    /// Comment-type taxonomy seed configuration
    pub comment_types: CommentTypesConfig,
    /// Orphaned blob reconciliation configuration
    pub sweep: SweepConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Relational store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file (default: "data/taskhub.db"), created when missing
    pub path: PathBuf,
    /// How long a writer waits for the database lock (default: 5000)
    pub busy_timeout_ms: u64,
}

/// Blob store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for uploaded files; keys look like {root}/{uuid}{ext}
    pub root: PathBuf,
}

/// Comment-type seed file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentTypesConfig {
    /// JSON array of {id, name} upserted at startup
    pub path: PathBuf,
}

/// Orphan sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Six-field cron expression (seconds first); empty disables the sweep
    pub cron: String,
    /// Files younger than this are never swept, covering in-flight uploads
    pub grace_secs: u64,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("TASKHUB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("TASKHUB_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .unwrap_or(8000),
            },
            database: DatabaseConfig {
                path: std::env::var("TASKHUB_DATABASE_PATH")
                    .unwrap_or_else(|_| "data/taskhub.db".to_string())
                    .into(),
                busy_timeout_ms: std::env::var("TASKHUB_DATABASE_BUSY_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5000),
            },
            storage: StorageConfig {
                root: std::env::var("TASKHUB_STORAGE_PATH")
                    .unwrap_or_else(|_| "storage".to_string())
                    .into(),
            },
            comment_types: CommentTypesConfig {
                path: std::env::var("TASKHUB_COMMENT_TYPES_PATH")
                    .unwrap_or_else(|_| "comment-types.json".to_string())
                    .into(),
            },
            sweep: SweepConfig {
                cron: std::env::var("TASKHUB_SWEEP_CRON")
                    .unwrap_or_else(|_| "0 0 3 * * *".to_string()),
                grace_secs: std::env::var("TASKHUB_SWEEP_GRACE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            },
        }
    }
}
