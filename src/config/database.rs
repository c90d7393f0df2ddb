use std::path::PathBuf;

use secrecy::SecretString;

use crate::config::helpers::{EnvLookup, optional_env, parse_env, parse_string_env};
use crate::error::ConfigError;

const DEFAULT_POOL_SIZE: usize = 10;

/// Which storage backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    LibSql,
    Postgres,
}

impl DatabaseBackend {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "libsql" | "turso" | "sqlite" => Ok(Self::LibSql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::InvalidValue {
                key: "DATABASE_BACKEND".to_string(),
                message: format!("unsupported backend '{other}'"),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LibSql => "libsql",
            Self::Postgres => "postgres",
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// PostgreSQL connection URL.
    pub database_url: Option<SecretString>,
    pub pool_size: usize,
    /// Local libSQL database file (also the replica file in remote mode).
    pub libsql_path: PathBuf,
    pub libsql_url: Option<String>,
    pub libsql_auth_token: Option<SecretString>,
}

pub fn default_libsql_path() -> PathBuf {
    PathBuf::from("./data/risk-matrix.db")
}

impl DatabaseConfig {
    pub(crate) fn resolve(env: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let backend = DatabaseBackend::from_str(&parse_string_env(
            env,
            "DATABASE_BACKEND",
            DatabaseBackend::LibSql.as_str(),
        )?)?;

        let database_url = optional_env(env, "DATABASE_URL")?.map(SecretString::from);
        if backend == DatabaseBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        let pool_size = parse_env(env, "DATABASE_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        if pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DATABASE_POOL_SIZE".to_string(),
                message: "pool size must be at least 1".to_string(),
            });
        }

        let libsql_path = optional_env(env, "LIBSQL_PATH")?
            .map(PathBuf::from)
            .unwrap_or_else(default_libsql_path);
        let libsql_url = optional_env(env, "LIBSQL_URL")?;
        let libsql_auth_token = optional_env(env, "LIBSQL_AUTH_TOKEN")?.map(SecretString::from);
        if libsql_url.is_some() && libsql_auth_token.is_none() {
            return Err(ConfigError::MissingEnvVar("LIBSQL_AUTH_TOKEN".to_string()));
        }

        Ok(Self {
            backend,
            database_url,
            pool_size,
            libsql_path,
            libsql_url,
            libsql_auth_token,
        })
    }
}
