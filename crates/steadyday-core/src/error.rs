//! Core error types for steadyday-core.
//!
//! The hierarchy mirrors the failure classes the bot distinguishes:
//! store faults abort a single request, configuration and validation
//! problems are reported at startup or corrected in place, and delivery
//! faults are classified so the scheduler can decide whether to retry.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Core error type for steadyday-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Outbound message delivery errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Admin-only operation invoked by a regular user
    #[error("Permission denied for user {user_id}")]
    PermissionDenied { user_id: i64 },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Online backup failed
    #[error("Backup to {path} failed: {message}")]
    BackupFailed { path: PathBuf, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// The blocking task running a store operation panicked or was cancelled
    #[error("Database task failed: {0}")]
    TaskFailed(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Behavior code outside the catalog
    #[error("Unknown behavior code: {0}")]
    UnknownBehavior(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Outcome classes of a failed outbound send.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Flood control hit; the transport asks us to wait before retrying.
    #[error("Rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Recipient blocked the bot or is otherwise unreachable.
    #[error("Recipient unreachable: {0}")]
    Forbidden(String),

    /// The request itself was rejected as malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Transport-level failure (connect, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    #[error("Delivery failed: {0}")]
    Other(String),
}

impl DeliveryError {
    /// Rate limits and network faults are worth one retry; everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DeliveryError::RateLimited { .. } | DeliveryError::Network(_)
        )
    }

    /// Backoff to apply before the single retry.
    ///
    /// Rate limits wait the advertised interval plus one second.
    pub fn backoff(&self) -> Duration {
        match self {
            DeliveryError::RateLimited { retry_after } => *retry_after + Duration::from_secs(1),
            _ => Duration::from_secs(1),
        }
    }
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => match code.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    DatabaseError::Locked
                }
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::from(err))
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
