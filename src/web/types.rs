//! Request and response types for the HTTP API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matrix::{MatrixDraft, RiskLevelDraft};

// --- Matrix ---

/// Risk level as submitted by a client. `id` is local to the request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskLevelBody {
    pub id: String,
    pub label: String,
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Body of `POST /matrix/create` and `PUT /matrix/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixTemplateBody {
    pub name: String,
    pub size: i64,
    pub x_title: String,
    pub y_title: String,
    #[serde(default)]
    pub project_id: Option<i64>,
    pub risk_levels: Vec<RiskLevelBody>,
    /// `"x-y"` cell key to risk level id.
    pub matrix_data: BTreeMap<String, String>,
}

impl MatrixTemplateBody {
    pub fn into_draft(self) -> MatrixDraft {
        MatrixDraft {
            name: self.name,
            size: self.size,
            x_title: self.x_title,
            y_title: self.y_title,
            project_id: self.project_id,
            risk_levels: self
                .risk_levels
                .into_iter()
                .map(|level| RiskLevelDraft {
                    client_id: level.id,
                    label: level.label,
                    color: level.color,
                    icon: level.icon,
                })
                .collect(),
            matrix_data: self.matrix_data,
        }
    }
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
