//! PostgreSQL backend for the Database trait.
//!
//! Uses a `deadpool-postgres` pool; the schema is managed by refinery
//! migrations embedded from `migrations/`.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::{GenericClient, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use secrecy::ExposeSecret as _;
use tokio_postgres::NoTls;

use crate::config::DatabaseConfig;
use crate::db::{Database, MatrixStore, resolve_cell_rows};
use crate::error::DatabaseError;
use crate::matrix::{
    CellCoord, CellLevelRow, LevelProjection, MatrixTemplateRecord, MatrixWritePlan,
};

mod embedded {
    refinery::embed_migrations!("migrations");
}

const TEMPLATE_COLUMNS: &str = "id, name, size, x_title, y_title, project_id";

/// PostgreSQL database backend.
pub struct PgBackend {
    pool: Pool,
}

impl PgBackend {
    /// Create a new PostgreSQL backend from configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config.database_url.as_ref().ok_or_else(|| {
            DatabaseError::Pool("DATABASE_URL required for the postgres backend".to_string())
        })?;

        let mut cfg = deadpool_postgres::Config::new();
        cfg.url = Some(url.expose_secret().to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;

        // Fail fast on unreachable servers instead of on the first request.
        let _conn = pool.get().await?;
        tracing::info!(pool_size = config.pool_size, "connected to postgres");

        Ok(Self { pool })
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }
}

fn to_u32(raw: i32, field: &str) -> Result<u32, DatabaseError> {
    u32::try_from(raw)
        .map_err(|_| DatabaseError::Serialization(format!("invalid {} value {}", field, raw)))
}

fn to_i32(value: u32, field: &str) -> Result<i32, DatabaseError> {
    i32::try_from(value).map_err(|_| {
        DatabaseError::Serialization(format!("{} value {} exceeds column range", field, value))
    })
}

fn row_to_template_record(
    row: &tokio_postgres::Row,
) -> Result<MatrixTemplateRecord, DatabaseError> {
    Ok(MatrixTemplateRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        size: to_u32(row.try_get("size")?, "matrix_templates.size")?,
        x_title: row.try_get("x_title")?,
        y_title: row.try_get("y_title")?,
        project_id: row.try_get("project_id")?,
    })
}

fn row_to_cell_level(
    row: &tokio_postgres::Row,
    projection: LevelProjection,
) -> Result<CellLevelRow, DatabaseError> {
    let label = match projection {
        LevelProjection::Full => row.try_get("title")?,
        LevelProjection::Summary => None,
    };
    Ok(CellLevelRow {
        coord: CellCoord::new(
            to_u32(row.try_get("x")?, "cell_mappings.x")?,
            to_u32(row.try_get("y")?, "cell_mappings.y")?,
        ),
        cell_type_id: row.try_get("cell_type_id")?,
        color: row.try_get("color")?,
        label,
    })
}

async fn insert_levels_and_cells<C>(
    client: &C,
    template_id: i64,
    plan: &MatrixWritePlan,
) -> Result<(), DatabaseError>
where
    C: GenericClient + Sync,
{
    let mut level_ids = HashMap::with_capacity(plan.levels.len());
    for level in &plan.levels {
        let row = client
            .query_one(
                "INSERT INTO cell_types (title, color, icon) VALUES ($1, $2, $3) RETURNING id",
                &[&level.label, &level.color, &level.icon],
            )
            .await?;
        level_ids.insert(level.client_id.clone(), row.try_get::<_, i64>(0)?);
    }

    let cells = resolve_cell_rows(plan, &level_ids)?;
    if cells.is_empty() {
        return Ok(());
    }

    let stmt = client
        .prepare(
            "INSERT INTO cell_mappings (template_id, cell_type_id, x, y) VALUES ($1, $2, $3, $4)",
        )
        .await?;
    for (coord, cell_type_id) in cells {
        let x = to_i32(coord.x, "x")?;
        let y = to_i32(coord.y, "y")?;
        client
            .execute(&stmt, &[&template_id, &cell_type_id, &x, &y])
            .await?;
    }
    Ok(())
}

#[async_trait]
impl MatrixStore for PgBackend {
    async fn list_templates(&self) -> Result<Vec<MatrixTemplateRecord>, DatabaseError> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM matrix_templates ORDER BY id ASC"),
                &[],
            )
            .await?;
        rows.iter().map(row_to_template_record).collect()
    }

    async fn get_template(&self, id: i64) -> Result<Option<MatrixTemplateRecord>, DatabaseError> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM matrix_templates WHERE id = $1"),
                &[&id],
            )
            .await?;
        row.map(|row| row_to_template_record(&row)).transpose()
    }

    async fn list_cell_levels(
        &self,
        template_id: i64,
        projection: LevelProjection,
    ) -> Result<Vec<CellLevelRow>, DatabaseError> {
        let sql = match projection {
            LevelProjection::Summary => {
                "SELECT m.x, m.y, t.id AS cell_type_id, t.color \
                 FROM cell_mappings m \
                 INNER JOIN cell_types t ON t.id = m.cell_type_id \
                 WHERE m.template_id = $1 \
                 ORDER BY m.id ASC"
            }
            LevelProjection::Full => {
                "SELECT m.x, m.y, t.id AS cell_type_id, t.color, t.title \
                 FROM cell_mappings m \
                 INNER JOIN cell_types t ON t.id = m.cell_type_id \
                 WHERE m.template_id = $1 \
                 ORDER BY m.id ASC"
            }
        };

        let conn = self.pool.get().await?;
        let rows = conn.query(sql, &[&template_id]).await?;
        rows.iter()
            .map(|row| row_to_cell_level(row, projection))
            .collect()
    }

    async fn create_matrix(
        &self,
        plan: &MatrixWritePlan,
    ) -> Result<MatrixTemplateRecord, DatabaseError> {
        let fields = &plan.template;
        let size = to_i32(fields.size, "size")?;

        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;

        let row = tx
            .query_one(
                &format!(
                    "INSERT INTO matrix_templates (name, size, x_title, y_title, project_id) \
                     VALUES ($1, $2, $3, $4, $5) \
                     RETURNING {TEMPLATE_COLUMNS}"
                ),
                &[
                    &fields.name,
                    &size,
                    &fields.x_title,
                    &fields.y_title,
                    &fields.project_id,
                ],
            )
            .await?;
        let record = row_to_template_record(&row)?;

        insert_levels_and_cells(&tx, record.id, plan).await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn replace_matrix(
        &self,
        id: i64,
        plan: &MatrixWritePlan,
    ) -> Result<Option<MatrixTemplateRecord>, DatabaseError> {
        let fields = &plan.template;
        let size = to_i32(fields.size, "size")?;

        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;

        let row = tx
            .query_opt(
                &format!(
                    "UPDATE matrix_templates \
                     SET name = $2, size = $3, x_title = $4, y_title = $5, project_id = $6 \
                     WHERE id = $1 \
                     RETURNING {TEMPLATE_COLUMNS}"
                ),
                &[
                    &id,
                    &fields.name,
                    &size,
                    &fields.x_title,
                    &fields.y_title,
                    &fields.project_id,
                ],
            )
            .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let record = row_to_template_record(&row)?;

        tx.execute("DELETE FROM cell_mappings WHERE template_id = $1", &[&id])
            .await?;
        insert_levels_and_cells(&tx, id, plan).await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    async fn delete_matrix(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.pool.get().await?;
        let affected = conn
            .execute("DELETE FROM matrix_templates WHERE id = $1", &[&id])
            .await?;
        Ok(affected > 0)
    }
}

#[async_trait]
impl Database for PgBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let mut client = self.pool.get().await?;
        let report = embedded::migrations::runner()
            .run_async(&mut **client)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        tracing::info!(
            applied = report.applied_migrations().len(),
            "postgres migrations complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{to_i32, to_u32};
    use crate::error::DatabaseError;

    #[test]
    fn integer_columns_reject_values_outside_u32_and_i32() {
        assert_eq!(to_u32(5, "size").expect("positive"), 5);
        assert!(matches!(
            to_u32(-1, "size"),
            Err(DatabaseError::Serialization(ref msg)) if msg.contains("size")
        ));

        assert_eq!(to_i32(7, "x").expect("fits"), 7);
        assert!(to_i32(u32::MAX, "x").is_err());
    }
}
