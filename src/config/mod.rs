//! Configuration loaded from the environment.
//!
//! `main` loads an optional `.env` file with `dotenvy` first; CLI flags are
//! applied on top of the resolved values.

mod database;
mod gateway;
mod helpers;

pub use database::{DatabaseBackend, DatabaseConfig, default_libsql_path};
pub use gateway::{AuthConfig, GatewayConfig};

use crate::error::ConfigError;

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(&|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    pub fn resolve(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabaseConfig::resolve(env)?,
            gateway: GatewayConfig::resolve(env)?,
        })
    }

    /// Database settings only, for commands that never serve HTTP.
    pub fn database_from_env() -> Result<DatabaseConfig, ConfigError> {
        DatabaseConfig::resolve(&|key| std::env::var(key).ok())
    }
}
