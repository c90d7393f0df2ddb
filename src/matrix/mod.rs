//! Risk matrix domain: templates, risk levels, and the cell codec that moves
//! a matrix between its relational rows and the flat client view.

pub mod assembler;
pub mod coordinate;
pub mod registry;
pub mod service;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use coordinate::CellCoord;
pub use service::MatrixService;

/// Icon stored for risk levels submitted without one.
pub const DEFAULT_LEVEL_ICON: &str = "default";

/// A stored matrix template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixTemplateRecord {
    pub id: i64,
    pub name: String,
    pub size: u32,
    pub x_title: String,
    pub y_title: String,
    pub project_id: Option<i64>,
}

/// A risk level as declared in one submission.
///
/// `client_id` is only meaningful inside that submission: cells refer to it,
/// and it is replaced by a server id once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskLevelDraft {
    pub client_id: String,
    pub label: String,
    pub color: String,
    pub icon: Option<String>,
}

/// A typed create/replace submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixDraft {
    pub name: String,
    pub size: i64,
    pub x_title: String,
    pub y_title: String,
    pub project_id: Option<i64>,
    pub risk_levels: Vec<RiskLevelDraft>,
    /// Cell key (`"x-y"`) to client-local risk level id.
    pub matrix_data: BTreeMap<String, String>,
}

/// Template columns written on create/replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFields {
    pub name: String,
    pub size: u32,
    pub x_title: String,
    pub y_title: String,
    pub project_id: Option<i64>,
}

/// A risk level row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRiskLevel {
    pub client_id: String,
    pub label: String,
    pub color: String,
    pub icon: String,
}

/// A cell mapping row to insert, still pointing at its level by client id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCellMapping {
    pub coord: CellCoord,
    pub level_client_id: String,
}

/// A fully validated write. Executing it is the storage layer's job and must
/// happen inside one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixWritePlan {
    pub template: TemplateFields,
    pub levels: Vec<NewRiskLevel>,
    /// Sorted by `(x, y)`.
    pub cells: Vec<NewCellMapping>,
}

/// Which risk level columns a read joins in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelProjection {
    /// Id and color only, for list thumbnails.
    Summary,
    /// Id, label and color.
    Full,
}

/// One cell mapping joined with its risk level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellLevelRow {
    pub coord: CellCoord,
    pub cell_type_id: i64,
    pub label: Option<String>,
    pub color: String,
}

/// Risk level as exposed in the flat client view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLevelView {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub color: String,
}

/// Flat client view of one matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixView {
    #[serde(flatten)]
    pub template: MatrixTemplateRecord,
    pub cells: BTreeMap<String, String>,
    pub risk_levels: Vec<RiskLevelView>,
}
