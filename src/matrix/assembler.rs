//! Translation between a submitted matrix and its relational rows.
//!
//! The write side turns a [`MatrixDraft`] into a [`MatrixWritePlan`] without
//! touching storage, so every rejection happens before a transaction opens.
//! The read side folds joined cell rows back into a [`MatrixView`].

use crate::error::MatrixError;
use crate::matrix::registry;
use crate::matrix::{
    CellCoord, CellLevelRow, DEFAULT_LEVEL_ICON, LevelProjection, MatrixDraft,
    MatrixTemplateRecord, MatrixView, MatrixWritePlan, NewCellMapping, NewRiskLevel,
    TemplateFields,
};

/// Largest accepted grid side. Both backends store sizes and coordinates in
/// signed 32-bit columns.
pub const MAX_GRID_SIZE: u32 = i32::MAX as u32;

/// Reject blank values; the submitted text is stored as given.
fn required_text(field: &str, value: &str) -> Result<String, MatrixError> {
    if value.trim().is_empty() {
        return Err(MatrixError::validation(field, "must not be empty"));
    }
    Ok(value.to_string())
}

fn validate_size(size: i64) -> Result<u32, MatrixError> {
    if size <= 0 {
        return Err(MatrixError::validation("size", "must be a positive integer"));
    }
    u32::try_from(size)
        .ok()
        .filter(|size| *size <= MAX_GRID_SIZE)
        .ok_or_else(|| {
            MatrixError::validation("size", format!("must not exceed {MAX_GRID_SIZE}"))
        })
}

fn validate_template_fields(draft: &MatrixDraft) -> Result<TemplateFields, MatrixError> {
    Ok(TemplateFields {
        name: required_text("name", &draft.name)?,
        size: validate_size(draft.size)?,
        x_title: required_text("xTitle", &draft.x_title)?,
        y_title: required_text("yTitle", &draft.y_title)?,
        project_id: draft.project_id,
    })
}

/// Validate a submission and expand it into the rows to persist.
pub fn plan_write(draft: &MatrixDraft) -> Result<MatrixWritePlan, MatrixError> {
    let template = validate_template_fields(draft)?;
    let index = registry::build_index(&draft.risk_levels)?;

    let mut cells = Vec::with_capacity(draft.matrix_data.len());
    for (key, level_id) in &draft.matrix_data {
        let coord = CellCoord::decode(key)?.ensure_within(template.size)?;
        if !index.contains_key(level_id.as_str()) {
            return Err(MatrixError::InvalidRiskLevelReference {
                id: level_id.clone(),
            });
        }
        cells.push(NewCellMapping {
            coord,
            level_client_id: level_id.clone(),
        });
    }
    cells.sort_by_key(|cell| (cell.coord.x, cell.coord.y));

    let levels = draft
        .risk_levels
        .iter()
        .map(|level| NewRiskLevel {
            client_id: level.client_id.clone(),
            label: level.label.clone(),
            color: level.color.clone(),
            icon: level
                .icon
                .as_deref()
                .map(str::trim)
                .filter(|icon| !icon.is_empty())
                .unwrap_or(DEFAULT_LEVEL_ICON)
                .to_string(),
        })
        .collect();

    Ok(MatrixWritePlan {
        template,
        levels,
        cells,
    })
}

/// Fold a template and its joined cell rows into the flat client view.
pub fn assemble_view(
    template: MatrixTemplateRecord,
    rows: &[CellLevelRow],
    projection: LevelProjection,
) -> MatrixView {
    let cells = rows
        .iter()
        .map(|row| (row.coord.encode(), row.cell_type_id.to_string()))
        .collect();

    MatrixView {
        template,
        cells,
        risk_levels: registry::collapse(rows, projection),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::{MAX_GRID_SIZE, assemble_view, plan_write};
    use crate::error::MatrixError;
    use crate::matrix::{
        CellCoord, CellLevelRow, LevelProjection, MatrixDraft, MatrixTemplateRecord,
        RiskLevelDraft, RiskLevelView,
    };

    fn level(id: &str, label: &str, color: &str) -> RiskLevelDraft {
        RiskLevelDraft {
            client_id: id.to_string(),
            label: label.to_string(),
            color: color.to_string(),
            icon: None,
        }
    }

    fn draft(size: i64, cells: &[(&str, &str)]) -> MatrixDraft {
        MatrixDraft {
            name: "Supplier risk".to_string(),
            size,
            x_title: "Impact".to_string(),
            y_title: "Likelihood".to_string(),
            project_id: None,
            risk_levels: vec![level("a", "Low", "green"), level("b", "High", "red")],
            matrix_data: cells
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn plan_write_sorts_cells_numerically() {
        let plan = plan_write(&draft(10, &[("10-1", "a"), ("2-1", "b"), ("2-10", "a")]))
            .expect("valid draft");

        let coords: Vec<CellCoord> = plan.cells.iter().map(|c| c.coord).collect();
        assert_eq!(
            coords,
            vec![
                CellCoord::new(2, 1),
                CellCoord::new(2, 10),
                CellCoord::new(10, 1)
            ]
        );
        assert_eq!(plan.cells[0].level_client_id, "b");
        assert_eq!(plan.levels.len(), 2);
        assert_eq!(plan.levels[0].icon, "default");
    }

    #[test]
    fn plan_write_stores_template_fields_verbatim() {
        let mut input = draft(3, &[]);
        input.name = "  Ops  ".to_string();
        let plan = plan_write(&input).expect("valid draft");
        assert_eq!(plan.template.name, "  Ops  ");
        assert_eq!(plan.template.size, 3);
        assert!(plan.cells.is_empty());
    }

    #[test]
    fn plan_write_keeps_explicit_icons() {
        let mut input = draft(3, &[]);
        input.risk_levels[1].icon = Some("flame".to_string());
        let plan = plan_write(&input).expect("valid draft");
        assert_eq!(plan.levels[1].icon, "flame");
    }

    #[test]
    fn plan_write_rejects_blank_fields_and_bad_size() {
        let mut blank_name = draft(3, &[]);
        blank_name.name = "   ".to_string();
        assert!(matches!(
            plan_write(&blank_name),
            Err(MatrixError::Validation { ref field, .. }) if field == "name"
        ));

        let mut blank_axis = draft(3, &[]);
        blank_axis.y_title = String::new();
        assert!(matches!(
            plan_write(&blank_axis),
            Err(MatrixError::Validation { ref field, .. }) if field == "yTitle"
        ));

        for size in [
            0,
            -4,
            i64::from(MAX_GRID_SIZE) + 1,
            3_000_000_000,
            i64::from(u32::MAX) + 1,
        ] {
            assert!(matches!(
                plan_write(&draft(size, &[])),
                Err(MatrixError::Validation { ref field, .. }) if field == "size"
            ));
        }

        let plan = plan_write(&draft(i64::from(MAX_GRID_SIZE), &[])).expect("largest size");
        assert_eq!(plan.template.size, MAX_GRID_SIZE);
    }

    #[test]
    fn plan_write_rejects_unknown_level_reference() {
        let err = plan_write(&draft(3, &[("1-1", "a"), ("2-2", "zzz")])).expect_err("bad ref");
        assert!(matches!(err, MatrixError::InvalidRiskLevelReference { ref id } if id == "zzz"));
    }

    #[test]
    fn plan_write_rejects_bad_coordinates() {
        assert!(matches!(
            plan_write(&draft(3, &[("1x1", "a")])),
            Err(MatrixError::MalformedCoordinate { .. })
        ));
        assert!(matches!(
            plan_write(&draft(3, &[("4-1", "a")])),
            Err(MatrixError::OutOfRangeCoordinate { size: 3, .. })
        ));
    }

    #[test]
    fn plan_write_rejects_duplicate_level_ids() {
        let mut input = draft(3, &[]);
        input.risk_levels.push(level("a", "Again", "blue"));
        assert!(matches!(
            plan_write(&input),
            Err(MatrixError::DuplicateLevelId { ref id }) if id == "a"
        ));
    }

    #[test]
    fn assemble_view_builds_cells_and_levels() {
        let template = MatrixTemplateRecord {
            id: 4,
            name: "Ops".to_string(),
            size: 2,
            x_title: "Impact".to_string(),
            y_title: "Likelihood".to_string(),
            project_id: None,
        };
        let rows = vec![
            CellLevelRow {
                coord: CellCoord::new(1, 1),
                cell_type_id: 1,
                label: Some("Low".to_string()),
                color: "green".to_string(),
            },
            CellLevelRow {
                coord: CellCoord::new(2, 2),
                cell_type_id: 1,
                label: Some("Low".to_string()),
                color: "green".to_string(),
            },
        ];

        let view = assemble_view(template.clone(), &rows, LevelProjection::Full);

        let expected_cells: BTreeMap<String, String> = [("1-1", "1"), ("2-2", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(view.template, template);
        assert_eq!(view.cells, expected_cells);
        assert_eq!(
            view.risk_levels,
            vec![RiskLevelView {
                id: "1".to_string(),
                label: Some("Low".to_string()),
                color: "green".to_string(),
            }]
        );
    }

    #[test]
    fn assemble_view_serializes_camel_case_flat_shape() {
        let template = MatrixTemplateRecord {
            id: 9,
            name: "Ops".to_string(),
            size: 1,
            x_title: "X".to_string(),
            y_title: "Y".to_string(),
            project_id: Some(2),
        };
        let view = assemble_view(template, &[], LevelProjection::Summary);
        let json = serde_json::to_value(&view).expect("serialize view");
        assert_eq!(
            json,
            serde_json::json!({
                "id": 9,
                "name": "Ops",
                "size": 1,
                "xTitle": "X",
                "yTitle": "Y",
                "projectId": 2,
                "cells": {},
                "riskLevels": []
            })
        );
    }
}
