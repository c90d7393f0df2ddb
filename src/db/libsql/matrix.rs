use std::collections::HashMap;

use libsql::{Connection, params};

use crate::db::{MatrixStore, resolve_cell_rows};
use crate::error::DatabaseError;
use crate::matrix::{
    CellCoord, CellLevelRow, LevelProjection, MatrixTemplateRecord, MatrixWritePlan,
};

use super::{LibSqlBackend, get_i64, get_opt_i64, get_opt_text, get_text, opt_i64};

const TEMPLATE_COLUMNS: &str = "id, name, size, x_title, y_title, project_id";

fn parse_u32(raw: i64, field: &str) -> Result<u32, DatabaseError> {
    u32::try_from(raw)
        .map_err(|_| DatabaseError::Serialization(format!("invalid {} value {}", field, raw)))
}

fn row_to_template_record(row: &libsql::Row) -> Result<MatrixTemplateRecord, DatabaseError> {
    Ok(MatrixTemplateRecord {
        id: get_i64(row, 0),
        name: get_text(row, 1),
        size: parse_u32(get_i64(row, 2), "matrix_templates.size")?,
        x_title: get_text(row, 3),
        y_title: get_text(row, 4),
        project_id: get_opt_i64(row, 5),
    })
}

fn row_to_cell_level(
    row: &libsql::Row,
    projection: LevelProjection,
) -> Result<CellLevelRow, DatabaseError> {
    let label = match projection {
        LevelProjection::Full => get_opt_text(row, 4),
        LevelProjection::Summary => None,
    };
    Ok(CellLevelRow {
        coord: CellCoord::new(
            parse_u32(get_i64(row, 0), "cell_mappings.x")?,
            parse_u32(get_i64(row, 1), "cell_mappings.y")?,
        ),
        cell_type_id: get_i64(row, 2),
        color: get_text(row, 3),
        label,
    })
}

/// Insert the plan's levels and cells for `template_id` on an open transaction.
async fn insert_levels_and_cells(
    conn: &Connection,
    template_id: i64,
    plan: &MatrixWritePlan,
) -> Result<(), DatabaseError> {
    let mut level_ids = HashMap::with_capacity(plan.levels.len());
    for level in &plan.levels {
        let row = conn
            .query(
                "INSERT INTO cell_types (title, color, icon) VALUES (?1, ?2, ?3) RETURNING id",
                params![level.label.as_str(), level.color.as_str(), level.icon.as_str()],
            )
            .await?
            .next()
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to insert risk level".to_string()))?;
        level_ids.insert(level.client_id.clone(), get_i64(&row, 0));
    }

    for (coord, cell_type_id) in resolve_cell_rows(plan, &level_ids)? {
        conn.execute(
            "INSERT INTO cell_mappings (template_id, cell_type_id, x, y) VALUES (?1, ?2, ?3, ?4)",
            params![
                template_id,
                cell_type_id,
                i64::from(coord.x),
                i64::from(coord.y)
            ],
        )
        .await?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl MatrixStore for LibSqlBackend {
    async fn list_templates(&self) -> Result<Vec<MatrixTemplateRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM matrix_templates ORDER BY id ASC"),
                (),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_template_record(&row)?);
        }
        Ok(out)
    }

    async fn get_template(&self, id: i64) -> Result<Option<MatrixTemplateRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM matrix_templates WHERE id = ?1 LIMIT 1"),
                params![id],
            )
            .await?
            .next()
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
                "SELECT m.x, m.y, t.id, t.color \
                 FROM cell_mappings m \
                 INNER JOIN cell_types t ON t.id = m.cell_type_id \
                 WHERE m.template_id = ?1 \
                 ORDER BY m.id ASC"
            }
            LevelProjection::Full => {
                "SELECT m.x, m.y, t.id, t.color, t.title \
                 FROM cell_mappings m \
                 INNER JOIN cell_types t ON t.id = m.cell_type_id \
                 WHERE m.template_id = ?1 \
                 ORDER BY m.id ASC"
            }
        };

        let conn = self.connect().await?;
        let mut rows = conn.query(sql, params![template_id]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_cell_level(&row, projection)?);
        }
        Ok(out)
    }

    async fn create_matrix(
        &self,
        plan: &MatrixWritePlan,
    ) -> Result<MatrixTemplateRecord, DatabaseError> {
        let conn = self.connect().await?;
        conn.execute("BEGIN IMMEDIATE", ()).await?;
        let create_result = async {
            let fields = &plan.template;
            let row = conn
                .query(
                    &format!(
                        "INSERT INTO matrix_templates (name, size, x_title, y_title, project_id) \
                         VALUES (?1, ?2, ?3, ?4, ?5) \
                         RETURNING {TEMPLATE_COLUMNS}"
                    ),
                    params![
                        fields.name.as_str(),
                        i64::from(fields.size),
                        fields.x_title.as_str(),
                        fields.y_title.as_str(),
                        opt_i64(fields.project_id),
                    ],
                )
                .await?
                .next()
                .await?
                .ok_or_else(|| DatabaseError::Query("failed to insert matrix".to_string()))?;
            let record = row_to_template_record(&row)?;

            insert_levels_and_cells(&conn, record.id, plan).await?;
            Ok::<_, DatabaseError>(record)
        }
        .await;

        match create_result {
            Ok(record) => {
                conn.execute("COMMIT", ()).await?;
                Ok(record)
            }
            Err(err) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(err)
            }
        }
    }

    async fn replace_matrix(
        &self,
        id: i64,
        plan: &MatrixWritePlan,
    ) -> Result<Option<MatrixTemplateRecord>, DatabaseError> {
        let conn = self.connect().await?;
        conn.execute("BEGIN IMMEDIATE", ()).await?;
        let replace_result = async {
            let fields = &plan.template;
            let row = conn
                .query(
                    &format!(
                        "UPDATE matrix_templates \
                         SET name = ?2, size = ?3, x_title = ?4, y_title = ?5, project_id = ?6 \
                         WHERE id = ?1 \
                         RETURNING {TEMPLATE_COLUMNS}"
                    ),
                    params![
                        id,
                        fields.name.as_str(),
                        i64::from(fields.size),
                        fields.x_title.as_str(),
                        fields.y_title.as_str(),
                        opt_i64(fields.project_id),
                    ],
                )
                .await?
                .next()
                .await?;
            let Some(row) = row else {
                return Ok(None);
            };
            let record = row_to_template_record(&row)?;

            conn.execute(
                "DELETE FROM cell_mappings WHERE template_id = ?1",
                params![id],
            )
            .await?;
            insert_levels_and_cells(&conn, id, plan).await?;
            Ok::<_, DatabaseError>(Some(record))
        }
        .await;

        match replace_result {
            Ok(Some(record)) => {
                conn.execute("COMMIT", ()).await?;
                Ok(Some(record))
            }
            Ok(None) => {
                conn.execute("ROLLBACK", ()).await?;
                Ok(None)
            }
            Err(err) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(err)
            }
        }
    }

    async fn delete_matrix(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let affected = conn
            .execute("DELETE FROM matrix_templates WHERE id = ?1", params![id])
            .await?;
        Ok(affected > 0)
    }
}
