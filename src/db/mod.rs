//! Database abstraction layer.
//!
//! Provides a backend-agnostic `Database` trait for matrix persistence. Two
//! implementations exist behind feature flags:
//!
//! - `libsql` (default backend): libSQL (Turso's SQLite fork), local file or
//!   remote replica
//! - `postgres`: `deadpool-postgres` + `tokio-postgres`

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "libsql")]
pub mod libsql;

#[cfg(feature = "libsql")]
pub mod libsql_migrations;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::matrix::{
    CellCoord, CellLevelRow, LevelProjection, MatrixTemplateRecord, MatrixWritePlan,
};

/// Create a database backend from configuration, run migrations, and return it.
pub async fn connect_from_config(
    config: &crate::config::DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    match config.backend {
        #[cfg(feature = "libsql")]
        crate::config::DatabaseBackend::LibSql => {
            use secrecy::ExposeSecret as _;

            let backend = if let Some(ref url) = config.libsql_url {
                let token = config.libsql_auth_token.as_ref().ok_or_else(|| {
                    DatabaseError::Pool(
                        "LIBSQL_AUTH_TOKEN required when LIBSQL_URL is set".to_string(),
                    )
                })?;
                libsql::LibSqlBackend::new_remote_replica(
                    &config.libsql_path,
                    url,
                    token.expose_secret(),
                )
                .await?
            } else {
                libsql::LibSqlBackend::new_local(&config.libsql_path).await?
            };
            backend.run_migrations().await?;
            Ok(Arc::new(backend))
        }
        #[cfg(feature = "postgres")]
        crate::config::DatabaseBackend::Postgres => {
            let pg = postgres::PgBackend::new(config).await?;
            pg.run_migrations().await?;
            Ok(Arc::new(pg))
        }
        #[allow(unreachable_patterns)]
        other => Err(DatabaseError::Pool(format!(
            "database backend '{}' is not compiled in",
            other.as_str()
        ))),
    }
}

/// Pair each planned cell with the server id of the level it references.
///
/// `level_ids` maps client-local level ids to the ids returned by the level
/// inserts of the same transaction.
pub(crate) fn resolve_cell_rows(
    plan: &MatrixWritePlan,
    level_ids: &HashMap<String, i64>,
) -> Result<Vec<(CellCoord, i64)>, DatabaseError> {
    plan.cells
        .iter()
        .map(|cell| {
            level_ids
                .get(&cell.level_client_id)
                .map(|id| (cell.coord, *id))
                .ok_or_else(|| {
                    DatabaseError::Query(format!(
                        "unresolved risk level '{}'",
                        cell.level_client_id
                    ))
                })
        })
        .collect()
}

// ==================== Sub-traits ====================

/// Matrix persistence.
///
/// Writes (`create_matrix`, `replace_matrix`) run as one transaction each:
/// the template, its fresh risk level rows and its cell mappings are stored
/// together or not at all.
#[async_trait]
pub trait MatrixStore: Send + Sync {
    async fn list_templates(&self) -> Result<Vec<MatrixTemplateRecord>, DatabaseError>;
    async fn get_template(&self, id: i64) -> Result<Option<MatrixTemplateRecord>, DatabaseError>;
    /// Cell mappings of one template joined with their risk level, in
    /// insertion order.
    async fn list_cell_levels(
        &self,
        template_id: i64,
        projection: LevelProjection,
    ) -> Result<Vec<CellLevelRow>, DatabaseError>;
    async fn create_matrix(
        &self,
        plan: &MatrixWritePlan,
    ) -> Result<MatrixTemplateRecord, DatabaseError>;
    /// Returns `None` when the template does not exist; nothing is written.
    async fn replace_matrix(
        &self,
        id: i64,
        plan: &MatrixWritePlan,
    ) -> Result<Option<MatrixTemplateRecord>, DatabaseError>;
    /// Cell mappings go with the template through the storage cascade.
    async fn delete_matrix(&self, id: i64) -> Result<bool, DatabaseError>;
}

/// Backend-agnostic database supertrait.
#[async_trait]
pub trait Database: MatrixStore + Send + Sync {
    /// Run schema migrations for this backend.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;
}
