//! Error types for the risk matrix service.

use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence gateway errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "libsql")]
    #[error("libsql error: {0}")]
    LibSql(#[from] libsql::Error),
}

#[cfg(feature = "postgres")]
impl From<deadpool_postgres::PoolError> for DatabaseError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

/// Session gate errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("session provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// HTTP gateway lifecycle errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },
}

/// Errors surfaced by the matrix core.
///
/// Every variant aborts the whole operation; writes that fail leave storage
/// untouched.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("invalid '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("malformed cell coordinate '{key}'")]
    MalformedCoordinate { key: String },

    #[error("cell coordinate '{key}' is outside a {size}x{size} grid")]
    OutOfRangeCoordinate { key: String, size: u32 },

    #[error("risk level id '{id}' is declared more than once")]
    DuplicateLevelId { id: String },

    #[error("invalid risk level reference: {id}")]
    InvalidRiskLevelReference { id: String },

    #[error("matrix {id} not found")]
    TemplateNotFound { id: i64 },

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl MatrixError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
