//! Entry points for the matrix endpoints.
//!
//! Each call is one short request/response unit: writes become a single
//! storage transaction, reads fan out per template.

use std::sync::Arc;

use futures::future::try_join_all;

use crate::context::RequestContext;
use crate::db::Database;
use crate::error::MatrixError;
use crate::matrix::assembler::{assemble_view, plan_write};
use crate::matrix::{LevelProjection, MatrixDraft, MatrixTemplateRecord, MatrixView};

pub struct MatrixService {
    store: Arc<dyn Database>,
}

impl MatrixService {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self { store }
    }

    /// All templates with their cells; risk levels carry id and color only.
    pub async fn list_all(&self, ctx: &RequestContext) -> Result<Vec<MatrixView>, MatrixError> {
        let templates = self.store.list_templates().await?;
        tracing::debug!(
            request_id = %ctx.request_id,
            user_id = ctx.user_id(),
            templates = templates.len(),
            "listing matrices"
        );

        let views = try_join_all(templates.into_iter().map(|template| async move {
            let rows = self
                .store
                .list_cell_levels(template.id, LevelProjection::Summary)
                .await?;
            Ok::<_, MatrixError>(assemble_view(template, &rows, LevelProjection::Summary))
        }))
        .await?;

        Ok(views)
    }

    pub async fn get(&self, ctx: &RequestContext, id: i64) -> Result<MatrixView, MatrixError> {
        let template = self
            .store
            .get_template(id)
            .await?
            .ok_or(MatrixError::TemplateNotFound { id })?;
        let rows = self
            .store
            .list_cell_levels(id, LevelProjection::Full)
            .await?;
        tracing::debug!(
            request_id = %ctx.request_id,
            user_id = ctx.user_id(),
            matrix_id = id,
            cells = rows.len(),
            "loaded matrix"
        );
        Ok(assemble_view(template, &rows, LevelProjection::Full))
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        draft: &MatrixDraft,
    ) -> Result<MatrixTemplateRecord, MatrixError> {
        let plan = plan_write(draft)?;
        let record = self.store.create_matrix(&plan).await?;
        tracing::info!(
            request_id = %ctx.request_id,
            user_id = ctx.user_id(),
            matrix_id = record.id,
            levels = plan.levels.len(),
            cells = plan.cells.len(),
            "created matrix"
        );
        Ok(record)
    }

    /// Replace every field and the whole cell set of an existing matrix.
    ///
    /// Concurrent replaces are last-write-wins; the losing writer's cells are
    /// discarded, not merged.
    pub async fn replace(
        &self,
        ctx: &RequestContext,
        id: i64,
        draft: &MatrixDraft,
    ) -> Result<MatrixTemplateRecord, MatrixError> {
        let plan = plan_write(draft)?;
        let record = self
            .store
            .replace_matrix(id, &plan)
            .await?
            .ok_or(MatrixError::TemplateNotFound { id })?;
        tracing::info!(
            request_id = %ctx.request_id,
            user_id = ctx.user_id(),
            matrix_id = id,
            levels = plan.levels.len(),
            cells = plan.cells.len(),
            "replaced matrix"
        );
        Ok(record)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: i64) -> Result<(), MatrixError> {
        if !self.store.delete_matrix(id).await? {
            return Err(MatrixError::TemplateNotFound { id });
        }
        tracing::info!(
            request_id = %ctx.request_id,
            user_id = ctx.user_id(),
            matrix_id = id,
            "deleted matrix"
        );
        Ok(())
    }
}
